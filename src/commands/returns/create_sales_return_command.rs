use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{line_amount, returns::returned_qty_for_shipment_line, txn_error, Command},
    db::DbPool,
    document_no,
    entities::sales_order,
    entities::sales_order_line,
    entities::sales_return::{self, SalesReturnStatus},
    entities::sales_return_line,
    entities::shipment::{self, ShipmentStatus},
    entities::shipment_line,
    errors::ServiceError,
    events::{Event, EventSender},
    masters,
};

lazy_static! {
    static ref SALES_RETURNS_CREATED: IntCounter = IntCounter::new(
        "sales_returns_created_total",
        "Total number of sales returns created"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_CREATE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_create_failures_total",
            "Total number of failed sales return creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSalesReturnLine {
    pub shipment_line_id: Uuid,
    pub qty: Decimal,
}

/// Drafts a customer return against a completed shipment. Every line traces
/// to one shipment line; order line, product and unit price are derived from
/// the trace, never supplied by the caller. The cumulative returned quantity
/// per shipment line (over all non-canceled returns) is capped at the shipped
/// quantity.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSalesReturnCommand {
    pub shipment_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "return needs at least one line"))]
    pub lines: Vec<NewSalesReturnLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSalesReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub shipment_id: Uuid,
    pub order_id: Uuid,
    pub status: SalesReturnStatus,
    pub total_qty: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreateSalesReturnCommand {
    type Result = CreateSalesReturnResult;

    #[instrument(name = "sales_return_create", skip(self, db_pool, event_sender), fields(shipment_id = %self.shipment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(created) => {
                SALES_RETURNS_CREATED.inc();
                info!(
                    return_no = %created.return_no,
                    shipment_id = %self.shipment_id,
                    lines = self.lines.len(),
                    "sales return created"
                );
                event_sender
                    .send(Event::SalesReturnCreated(created.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_RETURN_CREATE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CreateSalesReturnCommand {
    async fn run(&self, db: &DbPool) -> Result<CreateSalesReturnResult, ServiceError> {
        self.validate()?;
        for line in &self.lines {
            if line.qty <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "returned quantity must be positive for shipment line {}",
                    line.shipment_line_id
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for line in &self.lines {
            if !seen.insert(line.shipment_line_id) {
                return Err(ServiceError::ValidationError(format!(
                    "shipment line {} appears more than once",
                    line.shipment_line_id
                )));
            }
        }

        let cmd = self.clone();
        db.transaction::<_, CreateSalesReturnResult, ServiceError>(|txn| {
            Box::pin(async move { cmd.create_in_txn(txn).await })
        })
        .await
        .map_err(txn_error)
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CreateSalesReturnResult, ServiceError> {
        let shipment = shipment::Entity::find_by_id(self.shipment_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("shipment {}", self.shipment_id)))?;
        if shipment.status != ShipmentStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "shipment {} is not completed; nothing to return",
                shipment.shipment_no
            )));
        }

        let order = sales_order::Entity::find_by_id(shipment.order_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::ConsistencyViolation(format!(
                    "shipment {} references missing order {}",
                    shipment.shipment_no, shipment.order_id
                ))
            })?;

        masters::active_warehouse(txn, shipment.warehouse_id).await?;

        let shipment_lines = shipment_line::Entity::find()
            .filter(shipment_line::Column::ShipmentId.eq(shipment.id))
            .all(txn)
            .await?;

        // Resolve every trace and check the cumulative cap before inserting
        // anything.
        let mut planned: Vec<(shipment_line::Model, sales_order_line::Model, Decimal)> = Vec::new();
        for line in &self.lines {
            let shipment_line = shipment_lines
                .iter()
                .find(|l| l.id == line.shipment_line_id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "line {} does not belong to shipment {}",
                        line.shipment_line_id, shipment.shipment_no
                    ))
                })?;
            masters::active_product(txn, shipment_line.product_id).await?;

            let already = returned_qty_for_shipment_line(txn, shipment_line.id).await?;
            if already + line.qty > shipment_line.qty {
                return Err(ServiceError::ValidationError(format!(
                    "returning {} on top of {} already returned exceeds shipped {} on shipment line {}",
                    line.qty, already, shipment_line.qty, shipment_line.id
                )));
            }

            let order_line = sales_order_line::Entity::find_by_id(shipment_line.order_line_id)
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::ConsistencyViolation(format!(
                        "shipment line {} references missing order line {}",
                        shipment_line.id, shipment_line.order_line_id
                    ))
                })?;
            planned.push((shipment_line.clone(), order_line, line.qty));
        }

        let total_qty: Decimal = planned.iter().map(|(_, _, qty)| *qty).sum();
        let total_amount: Decimal = planned
            .iter()
            .map(|(_, order_line, qty)| line_amount(order_line.unit_price, *qty))
            .sum();

        let now = Utc::now();
        let ret = sales_return::ActiveModel {
            id: Set(Uuid::new_v4()),
            return_no: Set(document_no::generate(document_no::SALES_RETURN)),
            shipment_id: Set(shipment.id),
            order_id: Set(order.id),
            customer_id: Set(order.customer_id),
            warehouse_id: Set(shipment.warehouse_id),
            status: Set(SalesReturnStatus::PendingAudit),
            total_qty: Set(total_qty),
            total_amount: Set(total_amount),
            remark: Set(self.remark.clone()),
            created_by: Set(self.created_by.clone()),
            created_at: Set(now),
            audited_by: Set(None),
            audited_at: Set(None),
            received_by: Set(None),
            received_at: Set(None),
            qc_by: Set(None),
            qc_at: Set(None),
            qc_remark: Set(None),
            updated_at: Set(now),
        };
        let ret = ret.insert(txn).await?;

        for (shipment_line, order_line, qty) in &planned {
            let row = sales_return_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                return_id: Set(ret.id),
                shipment_line_id: Set(shipment_line.id),
                order_line_id: Set(order_line.id),
                product_id: Set(shipment_line.product_id),
                unit_price: Set(order_line.unit_price),
                qty: Set(*qty),
                amount: Set(line_amount(order_line.unit_price, *qty)),
                created_at: Set(now),
            };
            row.insert(txn).await?;
        }

        Ok(CreateSalesReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            shipment_id: shipment.id,
            order_id: order.id,
            status: ret.status,
            total_qty,
            total_amount,
            created_at: ret.created_at,
        })
    }
}
