use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
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
    ledger, masters,
};

lazy_static! {
    static ref SALES_ORDERS_AUDITED: IntCounter = IntCounter::new(
        "sales_orders_audited_total",
        "Total number of audited sales orders"
    )
    .expect("metric can be created");
    static ref SALES_ORDER_AUDIT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_order_audit_failures_total",
            "Total number of failed sales order audits"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Audits a draft sales order and reserves every line's ordered quantity.
/// Reservation is all-or-nothing: one short line rolls the whole audit back.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditSalesOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub audited_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditSalesOrderResult {
    pub order_id: Uuid,
    pub order_no: String,
    pub status: SalesOrderStatus,
    pub reserved_lines: usize,
}

#[async_trait::async_trait]
impl Command for AuditSalesOrderCommand {
    type Result = AuditSalesOrderResult;

    #[instrument(name = "sales_order_audit", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, AuditSalesOrderResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.audit_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(audited) => {
                SALES_ORDERS_AUDITED.inc();
                info!(
                    order_no = %audited.order_no,
                    reserved_lines = audited.reserved_lines,
                    "sales order audited, stock reserved"
                );
                event_sender
                    .send(Event::SalesOrderAudited(self.order_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_ORDER_AUDIT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl AuditSalesOrderCommand {
    async fn audit_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<AuditSalesOrderResult, ServiceError> {
        let order = sales_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales order {}", self.order_id)))?;

        // Claim the transition first; a failed reservation below rolls the
        // claim back with the rest of the transaction.
        let now = Utc::now();
        let claimed = sales_order::Entity::update_many()
            .col_expr(
                sales_order::Column::Status,
                Expr::value(SalesOrderStatus::Audited),
            )
            .col_expr(
                sales_order::Column::AuditedBy,
                Expr::value(Some(self.audited_by.clone())),
            )
            .col_expr(sales_order::Column::AuditedAt, Expr::value(Some(now)))
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(now))
            .filter(sales_order::Column::Id.eq(order.id))
            .filter(sales_order::Column::Status.eq(SalesOrderStatus::Draft))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "sales order {} cannot be audited from status {:?}",
                order.order_no, order.status
            )));
        }

        masters::active_warehouse(txn, order.warehouse_id).await?;

        let lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        for line in &lines {
            masters::active_product(txn, line.product_id).await?;
        }
        for line in &lines {
            ledger::reserve(txn, order.warehouse_id, line.product_id, line.ordered_qty).await?;
        }

        Ok(AuditSalesOrderResult {
            order_id: order.id,
            order_no: order.order_no,
            status: SalesOrderStatus::Audited,
            reserved_lines: lines.len(),
        })
    }
}
