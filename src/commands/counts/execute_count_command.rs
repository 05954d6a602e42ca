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
    document_no,
    entities::movement_log::MovementOperation,
    entities::stock_count::{self, StockCountStatus},
    entities::stock_count_line,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::{self, Claim},
    ledger,
};

lazy_static! {
    static ref STOCK_COUNTS_EXECUTED: IntCounter = IntCounter::new(
        "stock_counts_executed_total",
        "Total number of executed stock counts"
    )
    .expect("metric can be created");
    static ref STOCK_COUNT_EXECUTE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_count_execute_failures_total",
            "Total number of failed stock count executions"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Applies a pending count: snapshots the book quantity per line, books every
/// positive difference through one adjust-in document and every negative
/// difference through one adjust-out document, then completes the count.
/// Adjust-out quantities must clear the unreserved balance; reservations are
/// never consumed by a count. Idempotent by `(count_no, CountAdjustIn)` and
/// `(count_no, CountAdjustOut)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExecuteStockCountCommand {
    pub count_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub executed_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountLineOutcome {
    pub product_id: Uuid,
    pub counted_qty: Decimal,
    pub book_qty: Decimal,
    pub diff_qty: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecuteStockCountResult {
    pub count_id: Uuid,
    pub count_no: String,
    pub status: StockCountStatus,
    pub adjust_in_no: Option<String>,
    pub adjust_out_no: Option<String>,
    pub lines: Vec<CountLineOutcome>,
    pub idempotent_replay: bool,
}

#[async_trait::async_trait]
impl Command for ExecuteStockCountCommand {
    type Result = ExecuteStockCountResult;

    #[instrument(name = "stock_count_execute", skip(self, db_pool, event_sender), fields(count_id = %self.count_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ExecuteStockCountResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.execute_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(executed) if !executed.idempotent_replay => {
                STOCK_COUNTS_EXECUTED.inc();
                info!(
                    count_no = %executed.count_no,
                    adjust_in_no = ?executed.adjust_in_no,
                    adjust_out_no = ?executed.adjust_out_no,
                    "stock count executed"
                );
                event_sender
                    .send(Event::StockCountExecuted {
                        count_id: executed.count_id,
                        adjust_in_no: executed.adjust_in_no.clone(),
                        adjust_out_no: executed.adjust_out_no.clone(),
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                STOCK_COUNT_EXECUTE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ExecuteStockCountCommand {
    async fn execute_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ExecuteStockCountResult, ServiceError> {
        let count = stock_count::Entity::find_by_id(self.count_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("stock count {}", self.count_id)))?;

        let lines = stock_count_line::Entity::find()
            .filter(stock_count_line::Column::CountId.eq(count.id))
            .all(txn)
            .await?;

        if count.status == StockCountStatus::Completed {
            // Already applied: hand back the stored snapshot.
            let adjust_in =
                idempotency::find_execution(txn, &count.count_no, MovementOperation::CountAdjustIn)
                    .await?;
            let adjust_out = idempotency::find_execution(
                txn,
                &count.count_no,
                MovementOperation::CountAdjustOut,
            )
            .await?;
            return Ok(ExecuteStockCountResult {
                count_id: count.id,
                count_no: count.count_no,
                status: count.status,
                adjust_in_no: adjust_in.map(|d| d.document_no),
                adjust_out_no: adjust_out.map(|d| d.document_no),
                lines: lines
                    .iter()
                    .map(|l| CountLineOutcome {
                        product_id: l.product_id,
                        counted_qty: l.counted_qty,
                        book_qty: l.book_qty.unwrap_or(Decimal::ZERO),
                        diff_qty: l.diff_qty.unwrap_or(Decimal::ZERO),
                    })
                    .collect(),
                idempotent_replay: true,
            });
        }
        if count.status != StockCountStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "stock count {} cannot execute in status {:?}",
                count.count_no, count.status
            )));
        }

        // Snapshot the book side, then validate every decrease against the
        // unreserved balance before any adjustment is booked.
        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            let balance = ledger::find_balance(txn, count.warehouse_id, line.product_id).await?;
            let book = balance
                .as_ref()
                .map(|b| b.on_hand_qty)
                .unwrap_or(Decimal::ZERO);
            let diff = line.counted_qty - book;
            if diff < Decimal::ZERO {
                let available = balance
                    .as_ref()
                    .map(|b| b.available_qty())
                    .unwrap_or(Decimal::ZERO);
                if -diff > available {
                    return Err(ServiceError::InsufficientStock(format!(
                        "count {} would write off {} of product {} but only {} is unreserved",
                        count.count_no, -diff, line.product_id, available
                    )));
                }
            }
            outcomes.push((line.clone(), book, diff));
        }

        let any_in = outcomes.iter().any(|(_, _, diff)| *diff > Decimal::ZERO);
        let any_out = outcomes.iter().any(|(_, _, diff)| *diff < Decimal::ZERO);

        let adjust_in = if any_in {
            let claim = idempotency::claim_execution(
                txn,
                &count.count_no,
                MovementOperation::CountAdjustIn,
                &document_no::generate(document_no::COUNT_ADJUST_IN),
                count.warehouse_id,
                &self.executed_by,
            )
            .await?;
            match claim {
                Claim::Fresh(doc) => Some(doc),
                Claim::Replayed(_) => {
                    return Err(ServiceError::ConsistencyViolation(format!(
                        "count {} has an adjustment but is still pending",
                        count.count_no
                    )));
                }
            }
        } else {
            None
        };
        let adjust_out = if any_out {
            let claim = idempotency::claim_execution(
                txn,
                &count.count_no,
                MovementOperation::CountAdjustOut,
                &document_no::generate(document_no::COUNT_ADJUST_OUT),
                count.warehouse_id,
                &self.executed_by,
            )
            .await?;
            match claim {
                Claim::Fresh(doc) => Some(doc),
                Claim::Replayed(_) => {
                    return Err(ServiceError::ConsistencyViolation(format!(
                        "count {} has an adjustment but is still pending",
                        count.count_no
                    )));
                }
            }
        } else {
            None
        };

        let mut results = Vec::with_capacity(outcomes.len());
        for (line, book, diff) in &outcomes {
            if *diff > Decimal::ZERO {
                let doc = adjust_in.as_ref().ok_or_else(|| {
                    ServiceError::InternalError("adjust-in document missing".into())
                })?;
                let balance =
                    ledger::increase(txn, count.warehouse_id, line.product_id, *diff).await?;
                ledger::append_movement(
                    txn,
                    count.warehouse_id,
                    line.product_id,
                    MovementOperation::CountAdjustIn,
                    &doc.document_no,
                    *diff,
                    balance.on_hand_qty,
                )
                .await?;
                let doc_line =
                    idempotency::add_line(txn, doc.id, line.product_id, *diff).await?;
                idempotency::mark_line_applied(txn, doc_line.id, *diff).await?;
            } else if *diff < Decimal::ZERO {
                let doc = adjust_out.as_ref().ok_or_else(|| {
                    ServiceError::InternalError("adjust-out document missing".into())
                })?;
                let balance =
                    ledger::deduct_unreserved(txn, count.warehouse_id, line.product_id, -*diff)
                        .await?;
                ledger::append_movement(
                    txn,
                    count.warehouse_id,
                    line.product_id,
                    MovementOperation::CountAdjustOut,
                    &doc.document_no,
                    *diff,
                    balance.on_hand_qty,
                )
                .await?;
                let doc_line =
                    idempotency::add_line(txn, doc.id, line.product_id, -*diff).await?;
                idempotency::mark_line_applied(txn, doc_line.id, -*diff).await?;
            }

            stamp_line(txn, line, *book, *diff).await?;
            results.push(CountLineOutcome {
                product_id: line.product_id,
                counted_qty: line.counted_qty,
                book_qty: *book,
                diff_qty: *diff,
            });
        }

        let now = Utc::now();
        let updated = stock_count::Entity::update_many()
            .col_expr(
                stock_count::Column::Status,
                Expr::value(StockCountStatus::Completed),
            )
            .col_expr(
                stock_count::Column::ExecutedBy,
                Expr::value(Some(self.executed_by.clone())),
            )
            .col_expr(stock_count::Column::ExecutedAt, Expr::value(Some(now)))
            .col_expr(stock_count::Column::UpdatedAt, Expr::value(now))
            .filter(stock_count::Column::Id.eq(count.id))
            .filter(stock_count::Column::Status.eq(StockCountStatus::Pending))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "stock count {} changed status concurrently",
                count.count_no
            )));
        }

        if let Some(doc) = &adjust_in {
            idempotency::complete_execution(txn, doc.id).await?;
        }
        if let Some(doc) = &adjust_out {
            idempotency::complete_execution(txn, doc.id).await?;
        }

        Ok(ExecuteStockCountResult {
            count_id: count.id,
            count_no: count.count_no,
            status: StockCountStatus::Completed,
            adjust_in_no: adjust_in.map(|d| d.document_no),
            adjust_out_no: adjust_out.map(|d| d.document_no),
            lines: results,
            idempotent_replay: false,
        })
    }
}

async fn stamp_line(
    txn: &DatabaseTransaction,
    line: &stock_count_line::Model,
    book: Decimal,
    diff: Decimal,
) -> Result<(), ServiceError> {
    let result = stock_count_line::Entity::update_many()
        .col_expr(stock_count_line::Column::BookQty, Expr::value(Some(book)))
        .col_expr(stock_count_line::Column::DiffQty, Expr::value(Some(diff)))
        .filter(stock_count_line::Column::Id.eq(line.id))
        .filter(stock_count_line::Column::BookQty.is_null())
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConsistencyViolation(format!(
            "count line {} was already stamped",
            line.id
        )));
    }
    Ok(())
}
