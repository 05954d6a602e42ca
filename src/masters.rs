//! Master-data gate. The fulfillment engine only cares whether a referenced
//! warehouse, product or partner exists and is enabled; anything else about
//! master data is maintained elsewhere. A missing or disabled record rejects
//! the request before any stock effect.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::entities::partner::{self, PartnerKind};
use crate::entities::{product, warehouse};
use crate::errors::ServiceError;

pub async fn active_warehouse<C>(
    conn: &C,
    warehouse_id: Uuid,
) -> Result<warehouse::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let row = warehouse::Entity::find_by_id(warehouse_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("warehouse {} does not exist", warehouse_id))
        })?;
    if !row.enabled {
        return Err(ServiceError::ValidationError(format!(
            "warehouse {} is disabled",
            row.code
        )));
    }
    Ok(row)
}

pub async fn active_product<C>(conn: &C, product_id: Uuid) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let row = product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("product {} does not exist", product_id))
        })?;
    if !row.enabled {
        return Err(ServiceError::ValidationError(format!(
            "product {} is disabled",
            row.code
        )));
    }
    Ok(row)
}

/// Sales documents need a customer, purchase documents a supplier; the wrong
/// kind fails the same way a disabled partner does.
pub async fn active_partner<C>(
    conn: &C,
    partner_id: Uuid,
    kind: PartnerKind,
) -> Result<partner::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let row = partner::Entity::find_by_id(partner_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(format!("partner {} does not exist", partner_id))
        })?;
    if !row.enabled {
        return Err(ServiceError::ValidationError(format!(
            "partner {} is disabled",
            row.code
        )));
    }
    if row.kind != kind {
        return Err(ServiceError::ValidationError(format!(
            "partner {} is not a {:?}",
            row.code, kind
        )));
    }
    Ok(row)
}
