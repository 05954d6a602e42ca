use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{line_amount, txn_error, Command},
    db::DbPool,
    document_no,
    entities::partner::PartnerKind,
    entities::purchase_order::{self, PurchaseOrderStatus},
    entities::purchase_order_line,
    errors::ServiceError,
    events::{Event, EventSender},
    masters,
};

lazy_static! {
    static ref PURCHASE_ORDERS_CREATED: IntCounter = IntCounter::new(
        "purchase_orders_created_total",
        "Total number of purchase orders created"
    )
    .expect("metric can be created");
    static ref PURCHASE_ORDER_CREATE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_order_create_failures_total",
            "Total number of failed purchase order creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPurchaseOrderLine {
    pub product_id: Uuid,
    pub unit_price: Decimal,
    pub qty: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderCommand {
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "order needs at least one line"))]
    pub lines: Vec<NewPurchaseOrderLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePurchaseOrderResult {
    pub order_id: Uuid,
    pub order_no: String,
    pub status: PurchaseOrderStatus,
    pub total_qty: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreatePurchaseOrderCommand {
    type Result = CreatePurchaseOrderResult;

    #[instrument(name = "purchase_order_create", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(created) => {
                PURCHASE_ORDERS_CREATED.inc();
                info!(
                    order_no = %created.order_no,
                    supplier_id = %self.supplier_id,
                    lines = self.lines.len(),
                    "purchase order created"
                );
                event_sender
                    .send(Event::PurchaseOrderCreated(created.order_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                PURCHASE_ORDER_CREATE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CreatePurchaseOrderCommand {
    async fn run(&self, db: &DbPool) -> Result<CreatePurchaseOrderResult, ServiceError> {
        self.validate()?;
        for line in &self.lines {
            if line.qty <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "ordered quantity must be positive for product {}",
                    line.product_id
                )));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "unit price must not be negative for product {}",
                    line.product_id
                )));
            }
        }

        let cmd = self.clone();
        db.transaction::<_, CreatePurchaseOrderResult, ServiceError>(|txn| {
            Box::pin(async move { cmd.create_in_txn(txn).await })
        })
        .await
        .map_err(txn_error)
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CreatePurchaseOrderResult, ServiceError> {
        masters::active_warehouse(txn, self.warehouse_id).await?;
        masters::active_partner(txn, self.supplier_id, PartnerKind::Supplier).await?;
        for line in &self.lines {
            masters::active_product(txn, line.product_id).await?;
        }

        let total_qty: Decimal = self.lines.iter().map(|l| l.qty).sum();
        let total_amount: Decimal = self
            .lines
            .iter()
            .map(|l| line_amount(l.unit_price, l.qty))
            .sum();

        let now = Utc::now();
        let order = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_no: Set(document_no::generate(document_no::PURCHASE_ORDER)),
            supplier_id: Set(self.supplier_id),
            warehouse_id: Set(self.warehouse_id),
            status: Set(PurchaseOrderStatus::PendingAudit),
            total_qty: Set(total_qty),
            total_amount: Set(total_amount),
            remark: Set(self.remark.clone()),
            created_by: Set(self.created_by.clone()),
            created_at: Set(now),
            audited_by: Set(None),
            audited_at: Set(None),
            completed_at: Set(None),
            updated_at: Set(now),
        };
        let order = order.insert(txn).await?;

        for line in &self.lines {
            let row = purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                unit_price: Set(line.unit_price),
                ordered_qty: Set(line.qty),
                received_qty: Set(Decimal::ZERO),
                amount: Set(line_amount(line.unit_price, line.qty)),
                created_at: Set(now),
            };
            row.insert(txn).await?;
        }

        Ok(CreatePurchaseOrderResult {
            order_id: order.id,
            order_no: order.order_no,
            status: order.status,
            total_qty,
            total_amount,
            created_at: order.created_at,
        })
    }
}
