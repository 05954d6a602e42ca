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
    entities::purchase_return::{self, PurchaseReturnStatus},
    entities::purchase_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
    masters,
};

lazy_static! {
    static ref PURCHASE_RETURNS_CREATED: IntCounter = IntCounter::new(
        "purchase_returns_created_total",
        "Total number of purchase returns created"
    )
    .expect("metric can be created");
    static ref PURCHASE_RETURN_CREATE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_return_create_failures_total",
            "Total number of failed purchase return creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewPurchaseReturnLine {
    pub product_id: Uuid,
    pub unit_price: Decimal,
    pub qty: Decimal,
}

/// Drafts a return of goods to a supplier. Stock is untouched until the
/// audited return is executed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseReturnCommand {
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "return needs at least one line"))]
    pub lines: Vec<NewPurchaseReturnLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePurchaseReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub status: PurchaseReturnStatus,
    pub total_qty: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreatePurchaseReturnCommand {
    type Result = CreatePurchaseReturnResult;

    #[instrument(name = "purchase_return_create", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(created) => {
                PURCHASE_RETURNS_CREATED.inc();
                info!(
                    return_no = %created.return_no,
                    supplier_id = %self.supplier_id,
                    lines = self.lines.len(),
                    "purchase return created"
                );
                event_sender
                    .send(Event::PurchaseReturnCreated(created.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                PURCHASE_RETURN_CREATE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CreatePurchaseReturnCommand {
    async fn run(&self, db: &DbPool) -> Result<CreatePurchaseReturnResult, ServiceError> {
        self.validate()?;
        for line in &self.lines {
            if line.qty <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "returned quantity must be positive for product {}",
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
        db.transaction::<_, CreatePurchaseReturnResult, ServiceError>(|txn| {
            Box::pin(async move { cmd.create_in_txn(txn).await })
        })
        .await
        .map_err(txn_error)
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CreatePurchaseReturnResult, ServiceError> {
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
        let ret = purchase_return::ActiveModel {
            id: Set(Uuid::new_v4()),
            return_no: Set(document_no::generate(document_no::PURCHASE_RETURN)),
            supplier_id: Set(self.supplier_id),
            warehouse_id: Set(self.warehouse_id),
            status: Set(PurchaseReturnStatus::PendingAudit),
            total_qty: Set(total_qty),
            total_amount: Set(total_amount),
            remark: Set(self.remark.clone()),
            created_by: Set(self.created_by.clone()),
            created_at: Set(now),
            audited_by: Set(None),
            audited_at: Set(None),
            executed_by: Set(None),
            executed_at: Set(None),
            updated_at: Set(now),
        };
        let ret = ret.insert(txn).await?;

        for line in &self.lines {
            let row = purchase_return_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                return_id: Set(ret.id),
                product_id: Set(line.product_id),
                unit_price: Set(line.unit_price),
                qty: Set(line.qty),
                amount: Set(line_amount(line.unit_price, line.qty)),
                created_at: Set(now),
            };
            row.insert(txn).await?;
        }

        Ok(CreatePurchaseReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            status: ret.status,
            total_qty,
            total_amount,
            created_at: ret.created_at,
        })
    }
}
