use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{txn_error, Command},
    db::DbPool,
    entities::purchase_order::{self, PurchaseOrderStatus},
    entities::purchase_order_line,
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref PURCHASE_ORDERS_CANCELED: IntCounter = IntCounter::new(
        "purchase_orders_canceled_total",
        "Total number of canceled purchase orders"
    )
    .expect("metric can be created");
    static ref PURCHASE_ORDER_CANCEL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_order_cancel_failures_total",
            "Total number of failed purchase order cancellations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Cancels a purchase order that has not received anything yet. Once a
/// receipt applied, the order can only run to completion (or be corrected by
/// reversing its inbounds first). Canceling twice is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelPurchaseOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub canceled_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelPurchaseOrderResult {
    pub order_id: Uuid,
    pub status: PurchaseOrderStatus,
    /// True when the order was already canceled before this call.
    pub already_canceled: bool,
}

#[async_trait::async_trait]
impl Command for CancelPurchaseOrderCommand {
    type Result = CancelPurchaseOrderResult;

    #[instrument(name = "purchase_order_cancel", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, CancelPurchaseOrderResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.cancel_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(canceled) if !canceled.already_canceled => {
                PURCHASE_ORDERS_CANCELED.inc();
                info!(order_id = %self.order_id, "purchase order canceled");
                event_sender
                    .send(Event::PurchaseOrderCanceled(self.order_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                PURCHASE_ORDER_CANCEL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CancelPurchaseOrderCommand {
    async fn cancel_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CancelPurchaseOrderResult, ServiceError> {
        let order = purchase_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase order {}", self.order_id)))?;

        match order.status {
            PurchaseOrderStatus::Canceled => {
                return Ok(CancelPurchaseOrderResult {
                    order_id: order.id,
                    status: order.status,
                    already_canceled: true,
                });
            }
            PurchaseOrderStatus::PendingAudit | PurchaseOrderStatus::Audited => {}
            PurchaseOrderStatus::PartiallyReceived | PurchaseOrderStatus::Completed => {
                return Err(ServiceError::InvalidOperation(format!(
                    "purchase order {} has received goods and cannot be canceled",
                    order.order_no
                )));
            }
        }

        let any_received = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .filter(purchase_order_line::Column::ReceivedQty.gt(Decimal::ZERO))
            .one(txn)
            .await?
            .is_some();
        if any_received {
            return Err(ServiceError::ConsistencyViolation(format!(
                "purchase order {} carries received quantity in status {:?}",
                order.order_no, order.status
            )));
        }

        let claimed = purchase_order::Entity::update_many()
            .col_expr(
                purchase_order::Column::Status,
                Expr::value(PurchaseOrderStatus::Canceled),
            )
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_order::Column::Id.eq(order.id))
            .filter(purchase_order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "purchase order {} changed status concurrently",
                order.order_no
            )));
        }

        Ok(CancelPurchaseOrderResult {
            order_id: order.id,
            status: PurchaseOrderStatus::Canceled,
            already_canceled: false,
        })
    }
}
