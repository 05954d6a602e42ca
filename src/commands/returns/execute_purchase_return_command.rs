use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{txn_error, Command},
    db::DbPool,
    entities::movement_log::MovementOperation,
    entities::purchase_return::{self, PurchaseReturnStatus},
    entities::purchase_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::{self, Claim},
    ledger,
};

lazy_static! {
    static ref PURCHASE_RETURNS_EXECUTED: IntCounter = IntCounter::new(
        "purchase_returns_executed_total",
        "Total number of executed purchase returns"
    )
    .expect("metric can be created");
    static ref PURCHASE_RETURN_EXECUTE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_return_execute_failures_total",
            "Total number of failed purchase return executions"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Ships an audited purchase return back to the supplier: deducts unreserved
/// stock for every line and logs the outbound movements. Goods earmarked for
/// sales orders are never taken. Idempotent by `(return_no,
/// PurchaseReturnOut)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExecutePurchaseReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub executed_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutePurchaseReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub document_no: String,
    pub status: PurchaseReturnStatus,
    pub idempotent_replay: bool,
}

#[async_trait::async_trait]
impl Command for ExecutePurchaseReturnCommand {
    type Result = ExecutePurchaseReturnResult;

    #[instrument(name = "purchase_return_execute", skip(self, db_pool, event_sender), fields(return_id = %self.return_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ExecutePurchaseReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.execute_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(executed) if !executed.idempotent_replay => {
                PURCHASE_RETURNS_EXECUTED.inc();
                info!(
                    return_no = %executed.return_no,
                    document_no = %executed.document_no,
                    "purchase return executed"
                );
                event_sender
                    .send(Event::PurchaseReturnExecuted {
                        return_id: executed.return_id,
                        document_no: executed.document_no.clone(),
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                PURCHASE_RETURN_EXECUTE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ExecutePurchaseReturnCommand {
    async fn execute_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ExecutePurchaseReturnResult, ServiceError> {
        let ret = purchase_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase return {}", self.return_id)))?;

        let claim = idempotency::claim_execution(
            txn,
            &ret.return_no,
            MovementOperation::PurchaseReturnOut,
            &ret.return_no,
            ret.warehouse_id,
            &self.executed_by,
        )
        .await?;
        let doc = match claim {
            Claim::Replayed(doc) => {
                return Ok(ExecutePurchaseReturnResult {
                    return_id: ret.id,
                    return_no: ret.return_no,
                    document_no: doc.document_no,
                    status: ret.status,
                    idempotent_replay: true,
                });
            }
            Claim::Fresh(doc) => doc,
        };

        if ret.status != PurchaseReturnStatus::Audited {
            return Err(ServiceError::InvalidOperation(format!(
                "purchase return {} cannot execute in status {:?}",
                ret.return_no, ret.status
            )));
        }

        let lines = purchase_return_line::Entity::find()
            .filter(purchase_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;

        // Every line must clear the unreserved balance before anything moves.
        for line in &lines {
            let balance = ledger::find_balance(txn, ret.warehouse_id, line.product_id).await?;
            let available = balance.map(|b| b.available_qty()).unwrap_or(Decimal::ZERO);
            if line.qty > available {
                return Err(ServiceError::InsufficientStock(format!(
                    "return {} needs {} of product {} but only {} is unreserved",
                    ret.return_no, line.qty, line.product_id, available
                )));
            }
        }

        for line in &lines {
            let balance =
                ledger::deduct_unreserved(txn, ret.warehouse_id, line.product_id, line.qty).await?;
            ledger::append_movement(
                txn,
                ret.warehouse_id,
                line.product_id,
                MovementOperation::PurchaseReturnOut,
                &ret.return_no,
                -line.qty,
                balance.on_hand_qty,
            )
            .await?;
            let doc_line = idempotency::add_line(txn, doc.id, line.product_id, line.qty).await?;
            idempotency::mark_line_applied(txn, doc_line.id, line.qty).await?;
        }

        let now = Utc::now();
        let updated = purchase_return::Entity::update_many()
            .col_expr(
                purchase_return::Column::Status,
                Expr::value(PurchaseReturnStatus::Completed),
            )
            .col_expr(
                purchase_return::Column::ExecutedBy,
                Expr::value(Some(self.executed_by.clone())),
            )
            .col_expr(purchase_return::Column::ExecutedAt, Expr::value(Some(now)))
            .col_expr(purchase_return::Column::UpdatedAt, Expr::value(now))
            .filter(purchase_return::Column::Id.eq(ret.id))
            .filter(purchase_return::Column::Status.eq(PurchaseReturnStatus::Audited))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "purchase return {} changed status concurrently",
                ret.return_no
            )));
        }

        idempotency::complete_execution(txn, doc.id).await?;

        Ok(ExecutePurchaseReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            document_no: doc.document_no,
            status: PurchaseReturnStatus::Completed,
            idempotent_replay: false,
        })
    }
}
