use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
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
    ledger, masters,
};

lazy_static! {
    static ref SALES_SHIPMENTS: IntCounter = IntCounter::new(
        "sales_shipments_total",
        "Total number of executed sales shipments"
    )
    .expect("metric can be created");
    static ref SALES_SHIPMENT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_shipment_failures_total",
            "Total number of failed sales shipments"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShipLine {
    pub order_line_id: Uuid,
    pub qty: Decimal,
}

/// Ships a batch of lines from an audited order: consumes the matching
/// reservation and on-hand quantity in one step per line and records one
/// shipment document, keyed by its own identity.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ShipSalesOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub shipped_by: String,
    #[validate(length(min = 1, message = "shipment needs at least one line"))]
    pub lines: Vec<ShipLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippedLine {
    pub order_line_id: Uuid,
    pub product_id: Uuid,
    pub qty: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShipSalesOrderResult {
    pub shipment_id: Uuid,
    pub shipment_no: String,
    pub order_id: Uuid,
    pub order_status: SalesOrderStatus,
    pub lines: Vec<ShippedLine>,
    pub shipped_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for ShipSalesOrderCommand {
    type Result = ShipSalesOrderResult;

    #[instrument(name = "sales_order_ship", skip(self, db_pool, event_sender), fields(order_id = %self.order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        for line in &self.lines {
            if line.qty <= Decimal::ZERO {
                SALES_SHIPMENT_FAILURES
                    .with_label_values(&["validation"])
                    .inc();
                return Err(ServiceError::ValidationError(format!(
                    "shipped quantity must be positive for line {}",
                    line.order_line_id
                )));
            }
        }

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ShipSalesOrderResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.ship_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(shipped) => {
                SALES_SHIPMENTS.inc();
                info!(
                    shipment_no = %shipped.shipment_no,
                    order_status = ?shipped.order_status,
                    lines = shipped.lines.len(),
                    "sales shipment applied"
                );
                event_sender
                    .send(Event::SalesOrderShipped {
                        order_id: shipped.order_id,
                        shipment_no: shipped.shipment_no.clone(),
                        fully_shipped: shipped.order_status == SalesOrderStatus::Shipped,
                    })
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_SHIPMENT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ShipSalesOrderCommand {
    async fn ship_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ShipSalesOrderResult, ServiceError> {
        let order = sales_order::Entity::find_by_id(self.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales order {}", self.order_id)))?;
        if !matches!(
            order.status,
            SalesOrderStatus::Audited | SalesOrderStatus::PartiallyShipped
        ) {
            return Err(ServiceError::InvalidOperation(format!(
                "sales order {} cannot ship in status {:?}",
                order.order_no, order.status
            )));
        }

        masters::active_warehouse(txn, order.warehouse_id).await?;

        let order_lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;

        // Whole batch validated before the first mutation.
        let mut planned: Vec<(sales_order_line::Model, Decimal)> = Vec::new();
        for line in &self.lines {
            let order_line = order_lines
                .iter()
                .find(|l| l.id == line.order_line_id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "line {} does not belong to sales order {}",
                        line.order_line_id, order.order_no
                    ))
                })?;
            masters::active_product(txn, order_line.product_id).await?;
            let remaining = order_line.remaining_qty();
            if line.qty > remaining {
                return Err(ServiceError::ValidationError(format!(
                    "shipped {} exceeds remaining {} on line {}",
                    line.qty, remaining, order_line.id
                )));
            }
            planned.push((order_line.clone(), line.qty));
        }

        let now = Utc::now();
        let shipment = shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipment_no: Set(document_no::generate(document_no::SHIPMENT)),
            order_id: Set(order.id),
            warehouse_id: Set(order.warehouse_id),
            status: Set(ShipmentStatus::Completed),
            reversal_document_no: Set(None),
            reversed_by: Set(None),
            reversed_at: Set(None),
            created_by: Set(self.shipped_by.clone()),
            created_at: Set(now),
        };
        let shipment = shipment.insert(txn).await?;

        let mut shipped = Vec::with_capacity(planned.len());
        for (order_line, qty) in &planned {
            let balance =
                ledger::consume(txn, order.warehouse_id, order_line.product_id, *qty).await?;
            ledger::append_movement(
                txn,
                order.warehouse_id,
                order_line.product_id,
                MovementOperation::SalesOut,
                &shipment.shipment_no,
                -*qty,
                balance.on_hand_qty,
            )
            .await?;
            bump_shipped_qty(txn, order_line, *qty).await?;

            let row = shipment_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                shipment_id: Set(shipment.id),
                order_line_id: Set(order_line.id),
                product_id: Set(order_line.product_id),
                qty: Set(*qty),
                created_at: Set(now),
            };
            row.insert(txn).await?;
            shipped.push(ShippedLine {
                order_line_id: order_line.id,
                product_id: order_line.product_id,
                qty: *qty,
            });
        }

        let fresh_lines = sales_order_line::Entity::find()
            .filter(sales_order_line::Column::OrderId.eq(order.id))
            .all(txn)
            .await?;
        let new_status = status_from_lines(&fresh_lines);
        update_order_after_shipment(txn, &order, new_status, &self.shipped_by, now).await?;

        Ok(ShipSalesOrderResult {
            shipment_id: shipment.id,
            shipment_no: shipment.shipment_no,
            order_id: order.id,
            order_status: new_status,
            lines: shipped,
            shipped_at: now,
        })
    }
}

async fn bump_shipped_qty(
    txn: &DatabaseTransaction,
    line: &sales_order_line::Model,
    qty: Decimal,
) -> Result<(), ServiceError> {
    let result = sales_order_line::Entity::update_many()
        .col_expr(
            sales_order_line::Column::ShippedQty,
            Expr::value(line.shipped_qty + qty),
        )
        .filter(sales_order_line::Column::Id.eq(line.id))
        .filter(sales_order_line::Column::ShippedQty.eq(line.shipped_qty))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(format!(
            "order line {} was shipped concurrently",
            line.id
        )));
    }
    Ok(())
}

/// Ship-completion metadata is only set once the order is fully shipped.
async fn update_order_after_shipment(
    txn: &DatabaseTransaction,
    order: &sales_order::Model,
    new_status: SalesOrderStatus,
    shipped_by: &str,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let (by, at) = if new_status == SalesOrderStatus::Shipped {
        (Some(shipped_by.to_string()), Some(now))
    } else {
        (None, None)
    };
    let result = sales_order::Entity::update_many()
        .col_expr(sales_order::Column::Status, Expr::value(new_status))
        .col_expr(sales_order::Column::ShippedBy, Expr::value(by))
        .col_expr(sales_order::Column::ShippedAt, Expr::value(at))
        .col_expr(sales_order::Column::UpdatedAt, Expr::value(now))
        .filter(sales_order::Column::Id.eq(order.id))
        .filter(sales_order::Column::Status.eq(order.status))
        .exec(txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(format!(
            "sales order {} changed status concurrently",
            order.order_no
        )));
    }
    Ok(())
}
