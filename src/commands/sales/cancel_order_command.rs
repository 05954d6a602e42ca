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
    entities::sales_order::{self, SalesOrderStatus},
    entities::sales_order_line,
    errors::ServiceError,
    events::{Event, EventSender},
    ledger,
};

lazy_static! {
    static ref SALES_ORDERS_CANCELED: IntCounter = IntCounter::new(
        "sales_orders_canceled_total",
        "Total number of canceled sales orders"
    )
    .expect("metric can be created");
    static ref SALES_ORDER_CANCEL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_order_cancel_failures_total",
            "Total number of failed sales order cancellations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Cancels a sales order, releasing whatever is still reserved but unshipped.
/// A fully shipped order cannot be canceled; reverse its shipments instead.
/// Canceling twice is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelSalesOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub canceled_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelSalesOrderResult {
    pub order_id: Uuid,
    pub status: SalesOrderStatus,
    pub released_qty: Decimal,
    /// True when the order was already canceled before this call.
    pub already_canceled: bool,
}

#[async_trait::async_trait]
impl Command for CancelSalesOrderCommand {
    type Result = CancelSalesOrderResult;

    #[instrument(name = "sales_order_cancel", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, CancelSalesOrderResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.cancel_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(canceled) if !canceled.already_canceled => {
                SALES_ORDERS_CANCELED.inc();
                info!(
                    order_id = %self.order_id,
                    released_qty = %canceled.released_qty,
                    "sales order canceled"
                );
                event_sender
                    .send(Event::SalesOrderCanceled(self.order_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                SALES_ORDER_CANCEL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CancelSalesOrderCommand {
    async fn cancel_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CancelSalesOrderResult, ServiceError> {
        let order = sales_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales order {}", self.order_id)))?;

        let holds_reservation = match order.status {
            SalesOrderStatus::Canceled => {
                return Ok(CancelSalesOrderResult {
                    order_id: order.id,
                    status: order.status,
                    released_qty: Decimal::ZERO,
                    already_canceled: true,
                });
            }
            SalesOrderStatus::Shipped => {
                return Err(ServiceError::InvalidOperation(format!(
                    "sales order {} is fully shipped and cannot be canceled",
                    order.order_no
                )));
            }
            SalesOrderStatus::Draft => false,
            SalesOrderStatus::Audited | SalesOrderStatus::PartiallyShipped => true,
        };

        // Claim the terminal transition before touching reservations; any
        // release failure rolls the claim back.
        let claimed = sales_order::Entity::update_many()
            .col_expr(
                sales_order::Column::Status,
                Expr::value(SalesOrderStatus::Canceled),
            )
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sales_order::Column::Id.eq(order.id))
            .filter(sales_order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales order {} changed status concurrently",
                order.order_no
            )));
        }

        let mut released_qty = Decimal::ZERO;
        if holds_reservation {
            let lines = sales_order_line::Entity::find()
                .filter(sales_order_line::Column::OrderId.eq(order.id))
                .all(txn)
                .await?;
            for line in &lines {
                let outstanding = line.remaining_qty();
                if outstanding > Decimal::ZERO {
                    ledger::release(txn, order.warehouse_id, line.product_id, outstanding).await?;
                    released_qty += outstanding;
                }
            }
        }

        Ok(CancelSalesOrderResult {
            order_id: order.id,
            status: SalesOrderStatus::Canceled,
            released_qty,
            already_canceled: false,
        })
    }
}
