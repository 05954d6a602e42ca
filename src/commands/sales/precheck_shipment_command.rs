use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::DbPool,
    entities::sales_order::{self, SalesOrderStatus},
    entities::sales_order_line,
    errors::ServiceError,
    events::EventSender,
    ledger,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrecheckLine {
    pub order_line_id: Uuid,
    pub qty: Decimal,
}

/// Read-only dry run of a shipment: reports per line whether the requested
/// quantity fits both the order remainder and the warehouse availability,
/// without mutating anything. Callers use it to fail fast before the
/// transactional path.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PrecheckShipmentCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "precheck needs at least one line"))]
    pub lines: Vec<PrecheckLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrecheckLineReport {
    pub order_line_id: Uuid,
    pub product_id: Option<Uuid>,
    pub requested: Decimal,
    pub remaining: Decimal,
    pub available: Decimal,
    pub ok: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrecheckShipmentResult {
    pub order_id: Uuid,
    pub shippable: bool,
    pub lines: Vec<PrecheckLineReport>,
}

#[async_trait::async_trait]
impl Command for PrecheckShipmentCommand {
    type Result = PrecheckShipmentResult;

    #[instrument(name = "sales_shipment_precheck", skip(self, db_pool, _event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let db = db_pool.as_ref();

        let order = sales_order::Entity::find_by_id(self.order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales order {}", self.order_id)))?;
        if !matches!(
            order.status,
            SalesOrderStatus::Audited | SalesOrderStatus::PartiallyShipped
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "sales order {} cannot ship in status {:?}",
                order.order_no, order.status
            )));
        }

        let order_lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::OrderId.eq(order.id))
            .all(db)
            .await?;

        let mut reports = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let Some(order_line) = order_lines.iter().find(|l| l.id == line.order_line_id) else {
                reports.push(PrecheckLineReport {
                    order_line_id: line.order_line_id,
                    product_id: None,
                    requested: line.qty,
                    remaining: Decimal::ZERO,
                    available: Decimal::ZERO,
                    ok: false,
                    reason: Some("line does not belong to this order".into()),
                });
                continue;
            };

            let remaining = order_line.remaining_qty();
            let balance =
                ledger::find_balance(db, order.warehouse_id, order_line.product_id).await?;
            // For already-reserved lines the shippable quantity is the
            // reservation itself, so report on-hand as the physical bound.
            let available = balance.as_ref().map(|b| b.on_hand_qty).unwrap_or_default();

            let reason = if line.qty <= Decimal::ZERO {
                Some("requested quantity must be positive".into())
            } else if line.qty > remaining {
                Some(format!("requested {} exceeds remaining {}", line.qty, remaining))
            } else if line.qty > available {
                Some(format!(
                    "requested {} exceeds on-hand {}",
                    line.qty, available
                ))
            } else {
                None
            };

            reports.push(PrecheckLineReport {
                order_line_id: order_line.id,
                product_id: Some(order_line.product_id),
                requested: line.qty,
                remaining,
                available,
                ok: reason.is_none(),
                reason,
            });
        }

        Ok(PrecheckShipmentResult {
            order_id: order.id,
            shippable: reports.iter().all(|r| r.ok),
            lines: reports,
        })
    }
}
