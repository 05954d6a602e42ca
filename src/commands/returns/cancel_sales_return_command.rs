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
    commands::{returns::validate_against_shipment, txn_error, Command},
    db::DbPool,
    entities::sales_return::{self, SalesReturnStatus},
    entities::sales_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
    ledger,
};

lazy_static! {
    static ref SALES_RETURNS_CANCELED: IntCounter = IntCounter::new(
        "sales_returns_canceled_total",
        "Total number of canceled sales returns"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_CANCEL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_cancel_failures_total",
            "Total number of failed sales return cancellations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Cancels an open sales return and frees its claim on the shipment line
/// caps. A return canceled after receipt drains its QC bucket quantities; a
/// completed or QC-decided return can no longer be canceled. Canceling twice
/// is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelSalesReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub canceled_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelSalesReturnResult {
    pub return_id: Uuid,
    pub status: SalesReturnStatus,
    pub already_canceled: bool,
}

#[async_trait::async_trait]
impl Command for CancelSalesReturnCommand {
    type Result = CancelSalesReturnResult;

    #[instrument(name = "sales_return_cancel", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, CancelSalesReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.cancel_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(canceled) if !canceled.already_canceled => {
                SALES_RETURNS_CANCELED.inc();
                info!(return_id = %self.return_id, "sales return canceled");
                event_sender
                    .send(Event::SalesReturnCanceled(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                SALES_RETURN_CANCEL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CancelSalesReturnCommand {
    async fn cancel_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CancelSalesReturnResult, ServiceError> {
        let ret = sales_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales return {}", self.return_id)))?;

        let drains_qc = match ret.status {
            SalesReturnStatus::Canceled => {
                return Ok(CancelSalesReturnResult {
                    return_id: ret.id,
                    status: ret.status,
                    already_canceled: true,
                });
            }
            SalesReturnStatus::Completed | SalesReturnStatus::QcRejected => {
                return Err(ServiceError::InvalidOperation(format!(
                    "sales return {} already has a QC outcome and cannot be canceled",
                    ret.return_no
                )));
            }
            SalesReturnStatus::PendingAudit | SalesReturnStatus::Audited => false,
            SalesReturnStatus::PendingQc => true,
        };

        let lines = sales_return_line::Entity::find()
            .filter(sales_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;
        validate_against_shipment(txn, &ret.return_no, ret.shipment_id, &lines).await?;

        let claimed = sales_return::Entity::update_many()
            .col_expr(
                sales_return::Column::Status,
                Expr::value(SalesReturnStatus::Canceled),
            )
            .col_expr(sales_return::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sales_return::Column::Id.eq(ret.id))
            .filter(sales_return::Column::Status.eq(ret.status))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales return {} changed status concurrently",
                ret.return_no
            )));
        }

        if drains_qc {
            for line in &lines {
                ledger::qc_decrease(txn, ret.warehouse_id, line.product_id, line.qty).await?;
            }
        }

        Ok(CancelSalesReturnResult {
            return_id: ret.id,
            status: SalesReturnStatus::Canceled,
            already_canceled: false,
        })
    }
}
