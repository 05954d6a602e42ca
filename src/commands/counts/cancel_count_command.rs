use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::Command,
    db::DbPool,
    entities::stock_count::{self, StockCountStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref STOCK_COUNTS_CANCELED: IntCounter = IntCounter::new(
        "stock_counts_canceled_total",
        "Total number of canceled stock counts"
    )
    .expect("metric can be created");
    static ref STOCK_COUNT_CANCEL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_count_cancel_failures_total",
            "Total number of failed stock count cancellations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Cancels a pending count before any adjustment was booked. An executed
/// count is permanent; compensate with a fresh count instead. Canceling twice
/// is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelStockCountCommand {
    pub count_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub canceled_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelStockCountResult {
    pub count_id: Uuid,
    pub status: StockCountStatus,
    pub already_canceled: bool,
}

#[async_trait::async_trait]
impl Command for CancelStockCountCommand {
    type Result = CancelStockCountResult;

    #[instrument(name = "stock_count_cancel", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(canceled) if !canceled.already_canceled => {
                STOCK_COUNTS_CANCELED.inc();
                info!(count_id = %self.count_id, "stock count canceled");
                event_sender
                    .send(Event::StockCountCanceled(self.count_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                STOCK_COUNT_CANCEL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CancelStockCountCommand {
    async fn run(&self, db: &DbPool) -> Result<CancelStockCountResult, ServiceError> {
        self.validate()?;

        let count = stock_count::Entity::find_by_id(self.count_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("stock count {}", self.count_id)))?;

        match count.status {
            StockCountStatus::Canceled => {
                return Ok(CancelStockCountResult {
                    count_id: count.id,
                    status: count.status,
                    already_canceled: true,
                });
            }
            StockCountStatus::Completed => {
                return Err(ServiceError::InvalidOperation(format!(
                    "stock count {} is already executed and cannot be canceled",
                    count.count_no
                )));
            }
            StockCountStatus::Pending => {}
        }

        let claimed = stock_count::Entity::update_many()
            .col_expr(
                stock_count::Column::Status,
                Expr::value(StockCountStatus::Canceled),
            )
            .col_expr(stock_count::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(stock_count::Column::Id.eq(count.id))
            .filter(stock_count::Column::Status.eq(StockCountStatus::Pending))
            .exec(db)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "stock count {} changed status concurrently",
                count.count_no
            )));
        }

        Ok(CancelStockCountResult {
            count_id: count.id,
            status: StockCountStatus::Canceled,
            already_canceled: false,
        })
    }
}
