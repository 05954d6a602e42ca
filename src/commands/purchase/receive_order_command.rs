use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
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
    ledger, masters,
};

lazy_static! {
    static ref PURCHASE_RECEIPTS: IntCounter = IntCounter::new(
        "purchase_receipts_total",
        "Total number of applied purchase inbound receipts"
    )
    .expect("metric can be created");
    static ref PURCHASE_RECEIPT_REPLAYS: IntCounter = IntCounter::new(
        "purchase_receipt_replays_total",
        "Receipt submissions answered from a previously applied inbound"
    )
    .expect("metric can be created");
    static ref PURCHASE_RECEIPT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_receipt_failures_total",
            "Total number of failed purchase inbound receipts"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiptLine {
    pub order_line_id: Uuid,
    pub qty: Decimal,
}

/// Books an inbound receipt against an audited purchase order.
///
/// The client-supplied `request_token` makes the stock effect at-most-once:
/// a resubmission with the same token returns the original receipt, no matter
/// how often or how concurrently it is retried.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceivePurchaseOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 128))]
    pub request_token: String,
    #[validate(length(min = 1, max = 64))]
    pub received_by: String,
    #[validate(length(min = 1, message = "receipt needs at least one line"))]
    pub lines: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub order_line_id: Uuid,
    pub product_id: Uuid,
    pub qty: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceivePurchaseOrderResult {
    pub inbound_id: Uuid,
    pub inbound_no: String,
    pub order_id: Uuid,
    pub order_status: PurchaseOrderStatus,
    /// True when this call was answered from a previously applied receipt.
    pub idempotent_replay: bool,
    pub lines: Vec<ReceivedLine>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl Command for ReceivePurchaseOrderCommand {
    type Result = ReceivePurchaseOrderResult;

    #[instrument(name = "purchase_order_receive", skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        for line in &self.lines {
            if line.qty <= Decimal::ZERO {
                PURCHASE_RECEIPT_FAILURES
                    .with_label_values(&["validation"])
                    .inc();
                return Err(ServiceError::ValidationError(format!(
                    "received quantity must be positive for line {}",
                    line.order_line_id
                )));
            }
        }

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ReceivePurchaseOrderResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.receive_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(receipt) if receipt.idempotent_replay => {
                PURCHASE_RECEIPT_REPLAYS.inc();
                info!(
                    inbound_no = %receipt.inbound_no,
                    token = %self.request_token,
                    "receipt replayed from existing inbound"
                );
            }
            Ok(receipt) => {
                PURCHASE_RECEIPTS.inc();
                info!(
                    inbound_no = %receipt.inbound_no,
                    order_status = ?receipt.order_status,
                    lines = receipt.lines.len(),
                    "purchase receipt applied"
                );
                event_sender
                    .send(Event::PurchaseOrderReceived {
                        order_id: receipt.order_id,
                        inbound_no: receipt.inbound_no.clone(),
                        completed: receipt.order_status == PurchaseOrderStatus::Completed,
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                PURCHASE_RECEIPT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ReceivePurchaseOrderCommand {
    async fn receive_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ReceivePurchaseOrderResult, ServiceError> {
        if let Some(existing) = self.find_by_token(txn).await? {
            return self.replay(txn, existing).await;
        }

        let order = purchase_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase order {}", self.order_id)))?;
        if !matches!(
            order.status,
            PurchaseOrderStatus::Audited | PurchaseOrderStatus::PartiallyReceived
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "purchase order {} cannot receive goods in status {:?}",
                order.order_no, order.status
            )));
        }

        masters::active_warehouse(txn, order.warehouse_id).await?;

        let order_lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;

        // Validate the whole batch before any mutation.
        let mut planned: Vec<(purchase_order_line::Model, Decimal)> = Vec::new();
        for line in &self.lines {
            let order_line = order_lines
                .iter()
                .find(|l| l.id == line.order_line_id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "line {} does not belong to purchase order {}",
                        line.order_line_id, order.order_no
                    ))
                })?;
            masters::active_product(txn, order_line.product_id).await?;
            let remaining = order_line.remaining_qty();
            if line.qty > remaining {
                return Err(ServiceError::ValidationError(format!(
                    "received {} exceeds remaining {} on line {}",
                    line.qty, remaining, order_line.id
                )));
            }
            planned.push((order_line.clone(), line.qty));
        }

        let now = Utc::now();
        let inbound_no = document_no::generate(document_no::PURCHASE_INBOUND);
        let inbound = purchase_inbound::ActiveModel {
            id: Set(Uuid::new_v4()),
            inbound_no: Set(inbound_no.clone()),
            request_token: Set(self.request_token.clone()),
            order_id: Set(order.id),
            warehouse_id: Set(order.warehouse_id),
            status: Set(ExecutionStatus::Pending),
            reversal_document_no: Set(None),
            created_by: Set(self.received_by.clone()),
            created_at: Set(now),
            completed_at: Set(None),
        };
        let inserted = PurchaseInbound::insert(inbound)
            .on_conflict(
                OnConflict::column(purchase_inbound::Column::RequestToken)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;
        if inserted == 0 {
            // Lost the token race; answer with the winner's receipt.
            let winner = self.find_by_token(txn).await?.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "inbound vanished after token conflict ({})",
                    self.request_token
                ))
            })?;
            warn!(token = %self.request_token, "concurrent duplicate receipt detected");
            return self.replay(txn, winner).await;
        }
        let inbound = self.find_by_token(txn).await?.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "inbound vanished after insert ({})",
                self.request_token
            ))
        })?;

        let mut received = Vec::with_capacity(planned.len());
        for (order_line, qty) in &planned {
            let balance =
                ledger::increase(txn, order.warehouse_id, order_line.product_id, *qty).await?;
            ledger::append_movement(
                txn,
                order.warehouse_id,
                order_line.product_id,
                MovementOperation::PurchaseIn,
                &inbound.inbound_no,
                *qty,
                balance.on_hand_qty,
            )
            .await?;
            bump_received_qty(txn, order_line, *qty).await?;

            let line_row = purchase_inbound_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                inbound_id: Set(inbound.id),
                order_line_id: Set(order_line.id),
                product_id: Set(order_line.product_id),
                planned_qty: Set(*qty),
                applied_qty: Set(*qty),
                created_at: Set(now),
            };
            line_row.insert(txn).await?;
            received.push(ReceivedLine {
                order_line_id: order_line.id,
                product_id: order_line.product_id,
                qty: *qty,
            });
        }

        let fresh_lines = purchase_order_line::Entity::find()
            .filter(purchase_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        let new_status = status_from_lines(&fresh_lines);
        update_order_status(txn, &order, new_status, now).await?;
        complete_inbound(txn, inbound.id, now).await?;

        Ok(ReceivePurchaseOrderResult {
            inbound_id: inbound.id,
            inbound_no: inbound.inbound_no,
            order_id: order.id,
            order_status: new_status,
            idempotent_replay: false,
            lines: received,
            completed_at: Some(now),
        })
    }

    async fn find_by_token(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<Option<purchase_inbound::Model>, ServiceError> {
        let row = PurchaseInbound::find()
            .filter(purchase_inbound::Column::RequestToken.eq(self.request_token.clone()))
            .one(txn)
            .await?;
        Ok(row)
    }

    /// Rebuilds the original result from a previously applied inbound.
    async fn replay(
        &self,
        txn: &DatabaseTransaction,
        inbound: purchase_inbound::Model,
    ) -> Result<ReceivePurchaseOrderResult, ServiceError> {
        if inbound.status != ExecutionStatus::Completed {
            return Err(ServiceError::ConcurrentModification(format!(
                "receipt with token {} is still in flight",
                self.request_token
            )));
        }
        let order = purchase_order::Entity::find_by_id(inbound.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "inbound {} references missing order {}",
                    inbound.inbound_no, inbound.order_id
                ))
            })?;
        let lines = purchase_inbound_line::Entity::find()
            .filter(purchase_inbound_line::Column::InboundId.eq(inbound.id))
            .all(txn)
            .await?;
        Ok(ReceivePurchaseOrderResult {
            inbound_id: inbound.id,
            inbound_no: inbound.inbound_no,
            order_id: order.id,
            order_status: order.status,
            idempotent_replay: true,
            lines: lines
                .into_iter()
                .map(|l| ReceivedLine {
                    order_line_id: l.order_line_id,
                    product_id: l.product_id,
                    qty: l.applied_qty,
                })
                .collect(),
            completed_at: inbound.completed_at,
        })
    }
}

/// Accumulates the fulfilled counter, guarded against concurrent receipts of
/// the same line.
async fn bump_received_qty(
    txn: &DatabaseTransaction,
    line: &purchase_order_line::Model,
    qty: Decimal,
) -> Result<(), ServiceError> {
    let result = purchase_order_line::Entity::update_many()
        .col_expr(
            purchase_order_line::Column::ReceivedQty,
            Expr::value(line.received_qty + qty),
        )
        .filter(purchase_order_line::Column::Id.eq(line.id))
        .filter(purchase_order_line::Column::ReceivedQty.eq(line.received_qty))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(format!(
            "order line {} was received concurrently",
            line.id
        )));
    }
    Ok(())
}

async fn update_order_status(
    txn: &DatabaseTransaction,
    order: &purchase_order::Model,
    new_status: PurchaseOrderStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let completed_at = if new_status == PurchaseOrderStatus::Completed {
        Some(now)
    } else {
        None
    };
    let result = purchase_order::Entity::update_many()
        .col_expr(purchase_order::Column::Status, Expr::value(new_status))
        .col_expr(
            purchase_order::Column::CompletedAt,
            Expr::value(completed_at),
        )
        .col_expr(purchase_order::Column::UpdatedAt, Expr::value(now))
        .filter(purchase_order::Column::Id.eq(order.id))
        .filter(purchase_order::Column::Status.eq(order.status))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(format!(
            "purchase order {} changed status concurrently",
            order.order_no
        )));
    }
    Ok(())
}

async fn complete_inbound(
    txn: &DatabaseTransaction,
    inbound_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let result = PurchaseInbound::update_many()
        .col_expr(
            purchase_inbound::Column::Status,
            Expr::value(ExecutionStatus::Completed),
        )
        .col_expr(purchase_inbound::Column::CompletedAt, Expr::value(Some(now)))
        .filter(purchase_inbound::Column::Id.eq(inbound_id))
        .filter(purchase_inbound::Column::Status.eq(ExecutionStatus::Pending))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConsistencyViolation(format!(
            "inbound {} was not pending at completion",
            inbound_id
        )));
    }
    Ok(())
}
