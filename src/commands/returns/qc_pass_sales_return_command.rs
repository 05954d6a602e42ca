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
    entities::movement_log::MovementOperation,
    entities::sales_return::{self, SalesReturnStatus},
    entities::sales_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::{self, Claim},
    ledger,
};

lazy_static! {
    static ref SALES_RETURNS_QC_PASSED: IntCounter = IntCounter::new(
        "sales_returns_qc_passed_total",
        "Total number of sales returns passed by quality control"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_QC_PASS_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_qc_pass_failures_total",
            "Total number of failed sales return QC passes"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Quality control accepts the received goods: each line moves from the QC
/// bucket into on-hand stock with a `SalesReturnIn` movement, and the return
/// completes. Idempotent by `(return_no, SalesReturnIn)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QcPassSalesReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub qc_by: String,
    #[validate(length(max = 500))]
    pub qc_remark: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QcPassSalesReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub status: SalesReturnStatus,
    pub idempotent_replay: bool,
}

#[async_trait::async_trait]
impl Command for QcPassSalesReturnCommand {
    type Result = QcPassSalesReturnResult;

    #[instrument(name = "sales_return_qc_pass", skip(self, db_pool, event_sender), fields(return_id = %self.return_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, QcPassSalesReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.pass_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(passed) if !passed.idempotent_replay => {
                SALES_RETURNS_QC_PASSED.inc();
                info!(return_no = %passed.return_no, "sales return passed QC");
                event_sender
                    .send(Event::SalesReturnCompleted(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                SALES_RETURN_QC_PASS_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl QcPassSalesReturnCommand {
    async fn pass_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<QcPassSalesReturnResult, ServiceError> {
        let ret = sales_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales return {}", self.return_id)))?;

        let claim = idempotency::claim_execution(
            txn,
            &ret.return_no,
            MovementOperation::SalesReturnIn,
            &ret.return_no,
            ret.warehouse_id,
            &self.qc_by,
        )
        .await?;
        let doc = match claim {
            Claim::Replayed(_) => {
                return Ok(QcPassSalesReturnResult {
                    return_id: ret.id,
                    return_no: ret.return_no,
                    status: ret.status,
                    idempotent_replay: true,
                });
            }
            Claim::Fresh(doc) => doc,
        };

        if ret.status != SalesReturnStatus::PendingQc {
            return Err(ServiceError::InvalidOperation(format!(
                "sales return {} cannot pass QC from status {:?}",
                ret.return_no, ret.status
            )));
        }

        let lines = sales_return_line::Entity::find()
            .filter(sales_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;
        validate_against_shipment(txn, &ret.return_no, ret.shipment_id, &lines).await?;

        for line in &lines {
            // Drain the QC bucket first so a short bucket aborts before the
            // stock side moves.
            ledger::qc_decrease(txn, ret.warehouse_id, line.product_id, line.qty).await?;
            let balance = ledger::increase(txn, ret.warehouse_id, line.product_id, line.qty).await?;
            ledger::append_movement(
                txn,
                ret.warehouse_id,
                line.product_id,
                MovementOperation::SalesReturnIn,
                &ret.return_no,
                line.qty,
                balance.on_hand_qty,
            )
            .await?;
            let doc_line = idempotency::add_line(txn, doc.id, line.product_id, line.qty).await?;
            idempotency::mark_line_applied(txn, doc_line.id, line.qty).await?;
        }

        let now = Utc::now();
        let updated = sales_return::Entity::update_many()
            .col_expr(
                sales_return::Column::Status,
                Expr::value(SalesReturnStatus::Completed),
            )
            .col_expr(
                sales_return::Column::QcBy,
                Expr::value(Some(self.qc_by.clone())),
            )
            .col_expr(sales_return::Column::QcAt, Expr::value(Some(now)))
            .col_expr(
                sales_return::Column::QcRemark,
                Expr::value(self.qc_remark.clone()),
            )
            .col_expr(sales_return::Column::UpdatedAt, Expr::value(now))
            .filter(sales_return::Column::Id.eq(ret.id))
            .filter(sales_return::Column::Status.eq(SalesReturnStatus::PendingQc))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales return {} changed status concurrently",
                ret.return_no
            )));
        }

        idempotency::complete_execution(txn, doc.id).await?;

        Ok(QcPassSalesReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            status: SalesReturnStatus::Completed,
            idempotent_replay: false,
        })
    }
}
