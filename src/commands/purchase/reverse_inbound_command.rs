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
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{purchase::status_from_lines, txn_error, Command},
    db::DbPool,
    document_no,
    entities::movement_log::MovementOperation,
    entities::purchase_inbound::{self, Entity as PurchaseInbound},
    entities::purchase_inbound_line,
    entities::purchase_order::{self, PurchaseOrderStatus},
    entities::purchase_order_line,
    entities::stock_document::ExecutionStatus,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::{self, Claim},
    ledger,
};

lazy_static! {
    static ref INBOUND_REVERSALS: IntCounter = IntCounter::new(
        "purchase_inbound_reversals_total",
        "Total number of reversed purchase inbounds"
    )
    .expect("metric can be created");
    static ref INBOUND_REVERSAL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_inbound_reversal_failures_total",
            "Total number of failed purchase inbound reversals"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Undoes a completed inbound receipt: deducts the received quantities and
/// rolls the order's fulfillment counters back. Idempotent by
/// `(inbound_no, PurchaseInReverse)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReverseInboundCommand {
    #[validate(length(min = 1, max = 64))]
    pub inbound_no: String,
    #[validate(length(min = 1, max = 64))]
    pub reversed_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReverseInboundResult {
    pub reversal_no: String,
    pub inbound_no: String,
    pub order_id: Uuid,
    pub order_status: PurchaseOrderStatus,
    pub idempotent_replay: bool,
}

#[async_trait::async_trait]
impl Command for ReverseInboundCommand {
    type Result = ReverseInboundResult;

    #[instrument(name = "purchase_inbound_reverse", skip(self, db_pool, event_sender), fields(inbound_no = %self.inbound_no))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ReverseInboundResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.reverse_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(reversal) if !reversal.idempotent_replay => {
                INBOUND_REVERSALS.inc();
                warn!(
                    inbound_no = %self.inbound_no,
                    reversal_no = %reversal.reversal_no,
                    "purchase inbound reversed"
                );
                event_sender
                    .send(Event::PurchaseInboundReversed {
                        order_id: reversal.order_id,
                        inbound_no: reversal.inbound_no.clone(),
                        reversal_no: reversal.reversal_no.clone(),
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                INBOUND_REVERSAL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ReverseInboundCommand {
    async fn reverse_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ReverseInboundResult, ServiceError> {
        let inbound = PurchaseInbound::find()
            .filter(purchase_inbound::Column::InboundNo.eq(self.inbound_no.clone()))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("inbound {}", self.inbound_no)))?;

        let order = purchase_order::Entity::find_by_id(inbound.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "inbound {} references missing order {}",
                    inbound.inbound_no, inbound.order_id
                ))
            })?;

        let claim = idempotency::claim_execution(
            txn,
            &inbound.inbound_no,
            MovementOperation::PurchaseInReverse,
            &document_no::generate(document_no::INBOUND_REVERSAL),
            inbound.warehouse_id,
            &self.reversed_by,
        )
        .await?;
        let doc = match claim {
            Claim::Replayed(doc) => {
                return Ok(ReverseInboundResult {
                    reversal_no: doc.document_no,
                    inbound_no: inbound.inbound_no,
                    order_id: order.id,
                    order_status: order.status,
                    idempotent_replay: true,
                });
            }
            Claim::Fresh(doc) => doc,
        };

        if inbound.status != ExecutionStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "inbound {} is not completed and cannot be reversed",
                inbound.inbound_no
            )));
        }

        let inbound_lines = purchase_inbound_line::Entity::find()
            .filter(purchase_inbound_line::Column::InboundId.eq(inbound.id))
            .all(txn)
            .await?;

        // Every line must still be physically removable before anything moves.
        for line in &inbound_lines {
            let available = ledger::find_balance(txn, inbound.warehouse_id, line.product_id)
                .await?
                .map(|b| b.available_qty())
                .unwrap_or(Decimal::ZERO);
            if line.applied_qty > available {
                return Err(ServiceError::InsufficientStock(format!(
                    "product {}: available={}, required={} to reverse inbound {}",
                    line.product_id, available, line.applied_qty, inbound.inbound_no
                )));
            }
        }

        for line in &inbound_lines {
            let balance = ledger::deduct_unreserved(
                txn,
                inbound.warehouse_id,
                line.product_id,
                line.applied_qty,
            )
            .await?;
            ledger::append_movement(
                txn,
                inbound.warehouse_id,
                line.product_id,
                MovementOperation::PurchaseInReverse,
                &doc.document_no,
                -line.applied_qty,
                balance.on_hand_qty,
            )
            .await?;
            let doc_line =
                idempotency::add_line(txn, doc.id, line.product_id, line.applied_qty).await?;
            idempotency::mark_line_applied(txn, doc_line.id, line.applied_qty).await?;
            roll_back_received_qty(txn, line.order_line_id, line.applied_qty).await?;
        }

        let fresh_lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        let new_status = status_from_lines(&fresh_lines);
        let now = Utc::now();
        let updated = purchase_order::Entity::update_many()
            .col_expr(purchase_order::Column::Status, Expr::value(new_status))
            .col_expr(
                purchase_order::Column::CompletedAt,
                Expr::value(None::<chrono::DateTime<Utc>>),
            )
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now))
            .filter(purchase_order::Column::Id.eq(order.id))
            .filter(purchase_order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "purchase order {} changed status concurrently",
                order.order_no
            )));
        }

        let voided = PurchaseInbound::update_many()
            .col_expr(
                purchase_inbound::Column::Status,
                Expr::value(ExecutionStatus::Canceled),
            )
            .col_expr(
                purchase_inbound::Column::ReversalDocumentNo,
                Expr::value(Some(doc.document_no.clone())),
            )
            .filter(purchase_inbound::Column::Id.eq(inbound.id))
            .filter(purchase_inbound::Column::Status.eq(ExecutionStatus::Completed))
            .exec(txn)
            .await?;
        if voided.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "inbound {} changed status concurrently",
                inbound.inbound_no
            )));
        }

        idempotency::complete_execution(txn, doc.id).await?;

        Ok(ReverseInboundResult {
            reversal_no: doc.document_no,
            inbound_no: inbound.inbound_no,
            order_id: order.id,
            order_status: new_status,
            idempotent_replay: false,
        })
    }
}

/// A rollback below zero fulfilled quantity means the counters and the
/// inbound disagree; that is corruption, not a bad request.
async fn roll_back_received_qty(
    txn: &DatabaseTransaction,
    order_line_id: Uuid,
    qty: Decimal,
) -> Result<(), ServiceError> {
    let line = purchase_order_line::Entity::find_by_id(order_line_id)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::ConsistencyViolation(format!(
                "inbound line references missing order line {}",
                order_line_id
            ))
        })?;
    let rolled_back = line.received_qty - qty;
    if rolled_back < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "reversal would drive received below zero on line {} ({} - {})",
            line.id, line.received_qty, qty
        )));
    }
    let result = purchase_order_line::Entity::update_many()
        .col_expr(
            purchase_order_line::Column::ReceivedQty,
            Expr::value(rolled_back),
        )
        .filter(purchase_order_line::Column::Id.eq(line.id))
        .filter(purchase_order_line::Column::ReceivedQty.eq(line.received_qty))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(format!(
            "order line {} was modified concurrently",
            line.id
        )));
    }
    Ok(())
}
