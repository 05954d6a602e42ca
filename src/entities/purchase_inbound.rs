use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::stock_document::ExecutionStatus;

/// Receipt of purchase-order goods into a warehouse.
///
/// Idempotent by the client-supplied `request_token` (unique): resubmitting
/// the same token returns the first receipt instead of booking stock twice.
/// A reversal is recorded through `stock_documents` keyed by
/// `(inbound_no, PurchaseInReverse)` and stamps `reversal_document_no` here.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_inbounds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub inbound_no: String,
    #[sea_orm(unique)]
    pub request_token: String,
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: ExecutionStatus,
    pub reversal_document_no: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_inbound_line::Entity")]
    Lines,
    #[sea_orm(
        belongs_to = "super::purchase_order::Entity",
        from = "Column::OrderId",
        to = "super::purchase_order::Column::Id"
    )]
    Order,
}

impl Related<super::purchase_inbound_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
