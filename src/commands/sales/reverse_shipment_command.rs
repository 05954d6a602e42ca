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
    commands::{sales::status_from_lines, txn_error, Command},
    db::DbPool,
    document_no,
    entities::movement_log::MovementOperation,
    entities::sales_order::{self, SalesOrderStatus},
    entities::sales_order_line,
    entities::shipment::{self, ShipmentStatus},
    entities::shipment_line,
    errors::ServiceError,
    events::{Event, EventSender},
    idempotency::{self, Claim},
    ledger,
};

lazy_static! {
    static ref SHIPMENT_REVERSALS: IntCounter = IntCounter::new(
        "sales_shipment_reversals_total",
        "Total number of reversed sales shipments"
    )
    .expect("metric can be created");
    static ref SHIPMENT_REVERSAL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_shipment_reversal_failures_total",
            "Total number of failed sales shipment reversals"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Undoes a completed shipment: restores on-hand stock AND the pre-shipment
/// reservation for every shipped line, then rolls the order's shipped
/// counters back. Idempotent by `(shipment_no, SalesOutReverse)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReverseShipmentCommand {
    #[validate(length(min = 1, max = 64))]
    pub shipment_no: String,
    #[validate(length(min = 1, max = 64))]
    pub reversed_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReverseShipmentResult {
    pub reversal_no: String,
    pub shipment_no: String,
    pub order_id: Uuid,
    pub order_status: SalesOrderStatus,
    pub idempotent_replay: bool,
}

#[async_trait::async_trait]
impl Command for ReverseShipmentCommand {
    type Result = ReverseShipmentResult;

    #[instrument(name = "sales_shipment_reverse", skip(self, db_pool, event_sender), fields(shipment_no = %self.shipment_no))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ReverseShipmentResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.reverse_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(reversal) if !reversal.idempotent_replay => {
                SHIPMENT_REVERSALS.inc();
                warn!(
                    shipment_no = %self.shipment_no,
                    reversal_no = %reversal.reversal_no,
                    order_status = ?reversal.order_status,
                    "sales shipment reversed"
                );
                event_sender
                    .send(Event::ShipmentReversed {
                        order_id: reversal.order_id,
                        shipment_no: reversal.shipment_no.clone(),
                        reversal_no: reversal.reversal_no.clone(),
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                SHIPMENT_REVERSAL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ReverseShipmentCommand {
    async fn reverse_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ReverseShipmentResult, ServiceError> {
        let shipment = shipment::Entity::find()
            .filter(shipment::Column::ShipmentNo.eq(self.shipment_no.clone()))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("shipment {}", self.shipment_no)))?;

        let order = sales_order::Entity::find_by_id(shipment.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "shipment {} references missing order {}",
                    shipment.shipment_no, shipment.order_id
                ))
            })?;

        let claim = idempotency::claim_execution(
            txn,
            &shipment.shipment_no,
            MovementOperation::SalesOutReverse,
            &document_no::generate(document_no::SHIPMENT_REVERSAL),
            shipment.warehouse_id,
            &self.reversed_by,
        )
        .await?;
        let doc = match claim {
            Claim::Replayed(doc) => {
                return Ok(ReverseShipmentResult {
                    reversal_no: doc.document_no,
                    shipment_no: shipment.shipment_no,
                    order_id: order.id,
                    order_status: order.status,
                    idempotent_replay: true,
                });
            }
            Claim::Fresh(doc) => doc,
        };

        // A canceled order already released its remaining reservation;
        // reversing into it would resurrect the order with a reservation
        // that no longer matches its outstanding quantity.
        if order.status == SalesOrderStatus::Canceled {
            return Err(ServiceError::InvalidOperation(format!(
                "sales order {} is canceled and its shipments cannot be reversed",
                order.order_no
            )));
        }
        if shipment.status != ShipmentStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "shipment {} is not completed and cannot be reversed",
                shipment.shipment_no
            )));
        }

        let lines = shipment_line::Entity::find()
            .filter(shipment_line::Column::ShipmentId.eq(shipment.id))
            .all(txn)
            .await?;

        for line in &lines {
            // Put the goods back, then re-earmark them for the order.
            let balance =
                ledger::increase(txn, shipment.warehouse_id, line.product_id, line.qty).await?;
            ledger::reserve(txn, shipment.warehouse_id, line.product_id, line.qty).await?;
            ledger::append_movement(
                txn,
                shipment.warehouse_id,
                line.product_id,
                MovementOperation::SalesOutReverse,
                &doc.document_no,
                line.qty,
                balance.on_hand_qty,
            )
            .await?;
            let doc_line = idempotency::add_line(txn, doc.id, line.product_id, line.qty).await?;
            idempotency::mark_line_applied(txn, doc_line.id, line.qty).await?;
            roll_back_shipped_qty(txn, line.order_line_id, line.qty).await?;
        }

        let fresh_lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        let new_status = status_from_lines(&fresh_lines);
        let now = Utc::now();
        // No longer fully shipped, so ship-completion metadata goes away.
        let updated = sales_order::Entity::update_many()
            .col_expr(sales_order::Column::Status, Expr::value(new_status))
            .col_expr(
                sales_order::Column::ShippedBy,
                Expr::value(None::<String>),
            )
            .col_expr(
                sales_order::Column::ShippedAt,
                Expr::value(None::<chrono::DateTime<Utc>>),
            )
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(now))
            .filter(sales_order::Column::Id.eq(order.id))
            .filter(sales_order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales order {} changed status concurrently",
                order.order_no
            )));
        }

        let reversed = shipment::Entity::update_many()
            .col_expr(
                shipment::Column::Status,
                Expr::value(ShipmentStatus::Reversed),
            )
            .col_expr(
                shipment::Column::ReversalDocumentNo,
                Expr::value(Some(doc.document_no.clone())),
            )
            .col_expr(
                shipment::Column::ReversedBy,
                Expr::value(Some(self.reversed_by.clone())),
            )
            .col_expr(shipment::Column::ReversedAt, Expr::value(Some(now)))
            .filter(shipment::Column::Id.eq(shipment.id))
            .filter(shipment::Column::Status.eq(ShipmentStatus::Completed))
            .exec(txn)
            .await?;
        if reversed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "shipment {} changed status concurrently",
                shipment.shipment_no
            )));
        }

        idempotency::complete_execution(txn, doc.id).await?;

        Ok(ReverseShipmentResult {
            reversal_no: doc.document_no,
            shipment_no: shipment.shipment_no,
            order_id: order.id,
            order_status: new_status,
            idempotent_replay: false,
        })
    }
}

async fn roll_back_shipped_qty(
    txn: &DatabaseTransaction,
    order_line_id: Uuid,
    qty: Decimal,
) -> Result<(), ServiceError> {
    let line = sales_order_line::Entity::find_by_id(order_line_id)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::ConsistencyViolation(format!(
                "shipment line references missing order line {}",
                order_line_id
            ))
        })?;
    let rolled_back = line.shipped_qty - qty;
    if rolled_back < Decimal::ZERO {
        return Err(ServiceError::ConsistencyViolation(format!(
            "reversal would drive shipped below zero on line {} ({} - {})",
            line.id, line.shipped_qty, qty
        )));
    }
    let result = sales_order_line::Entity::update_many()
        .col_expr(
            sales_order_line::Column::ShippedQty,
            Expr::value(rolled_back),
        )
        .filter(sales_order_line::Column::Id.eq(line.id))
        .filter(sales_order_line::Column::ShippedQty.eq(line.shipped_qty))
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
