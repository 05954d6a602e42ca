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
    commands::{txn_error, Command},
    db::DbPool,
    document_no,
    entities::stock_count::{self, StockCountStatus},
    entities::stock_count_line,
    errors::ServiceError,
    events::{Event, EventSender},
    masters,
};

lazy_static! {
    static ref STOCK_COUNTS_CREATED: IntCounter = IntCounter::new(
        "stock_counts_created_total",
        "Total number of stock counts created"
    )
    .expect("metric can be created");
    static ref STOCK_COUNT_CREATE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_count_create_failures_total",
            "Total number of failed stock count creations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewCountLine {
    pub product_id: Uuid,
    pub counted_qty: Decimal,
}

/// Records a physical count for one warehouse. Book and diff quantities stay
/// empty until execution so the snapshot reflects the stock at adjustment
/// time, not at entry time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStockCountCommand {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub created_by: String,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
    #[validate(length(min = 1, message = "count needs at least one line"))]
    pub lines: Vec<NewCountLine>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateStockCountResult {
    pub count_id: Uuid,
    pub count_no: String,
    pub status: StockCountStatus,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl Command for CreateStockCountCommand {
    type Result = CreateStockCountResult;

    #[instrument(name = "stock_count_create", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(created) => {
                STOCK_COUNTS_CREATED.inc();
                info!(
                    count_no = %created.count_no,
                    warehouse_id = %self.warehouse_id,
                    lines = self.lines.len(),
                    "stock count created"
                );
                event_sender
                    .send(Event::StockCountCreated(created.count_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                STOCK_COUNT_CREATE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CreateStockCountCommand {
    async fn run(&self, db: &DbPool) -> Result<CreateStockCountResult, ServiceError> {
        self.validate()?;
        let mut seen = std::collections::HashSet::new();
        for line in &self.lines {
            if line.counted_qty < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "counted quantity must not be negative for product {}",
                    line.product_id
                )));
            }
            if !seen.insert(line.product_id) {
                return Err(ServiceError::ValidationError(format!(
                    "product {} appears more than once in the count",
                    line.product_id
                )));
            }
        }

        let cmd = self.clone();
        db.transaction::<_, CreateStockCountResult, ServiceError>(|txn| {
            Box::pin(async move { cmd.create_in_txn(txn).await })
        })
        .await
        .map_err(txn_error)
    }

    async fn create_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<CreateStockCountResult, ServiceError> {
        masters::active_warehouse(txn, self.warehouse_id).await?;
        for line in &self.lines {
            masters::active_product(txn, line.product_id).await?;
        }

        let now = Utc::now();
        let count = stock_count::ActiveModel {
            id: Set(Uuid::new_v4()),
            count_no: Set(document_no::generate(document_no::STOCK_COUNT)),
            warehouse_id: Set(self.warehouse_id),
            status: Set(StockCountStatus::Pending),
            remark: Set(self.remark.clone()),
            created_by: Set(self.created_by.clone()),
            created_at: Set(now),
            executed_by: Set(None),
            executed_at: Set(None),
            updated_at: Set(now),
        };
        let count = count.insert(txn).await?;

        for line in &self.lines {
            let row = stock_count_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                count_id: Set(count.id),
                product_id: Set(line.product_id),
                counted_qty: Set(line.counted_qty),
                book_qty: Set(None),
                diff_qty: Set(None),
                created_at: Set(now),
            };
            row.insert(txn).await?;
        }

        Ok(CreateStockCountResult {
            count_id: count.id,
            count_no: count.count_no,
            status: count.status,
            created_at: count.created_at,
        })
    }
}
