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
    entities::purchase_return::{self, PurchaseReturnStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref PURCHASE_RETURNS_CANCELED: IntCounter = IntCounter::new(
        "purchase_returns_canceled_total",
        "Total number of canceled purchase returns"
    )
    .expect("metric can be created");
    static ref PURCHASE_RETURN_CANCEL_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_return_cancel_failures_total",
            "Total number of failed purchase return cancellations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Cancels an unexecuted purchase return. Once executed the stock has left
/// the warehouse and the return can no longer be canceled. Canceling twice is
/// a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelPurchaseReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub canceled_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelPurchaseReturnResult {
    pub return_id: Uuid,
    pub status: PurchaseReturnStatus,
    pub already_canceled: bool,
}

#[async_trait::async_trait]
impl Command for CancelPurchaseReturnCommand {
    type Result = CancelPurchaseReturnResult;

    #[instrument(name = "purchase_return_cancel", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(canceled) if !canceled.already_canceled => {
                PURCHASE_RETURNS_CANCELED.inc();
                info!(return_id = %self.return_id, "purchase return canceled");
                event_sender
                    .send(Event::PurchaseReturnCanceled(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Ok(_) => {}
            Err(e) => {
                PURCHASE_RETURN_CANCEL_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl CancelPurchaseReturnCommand {
    async fn run(&self, db: &DbPool) -> Result<CancelPurchaseReturnResult, ServiceError> {
        self.validate()?;

        let ret = purchase_return::Entity::find_by_id(self.return_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase return {}", self.return_id)))?;

        match ret.status {
            PurchaseReturnStatus::Canceled => {
                return Ok(CancelPurchaseReturnResult {
                    return_id: ret.id,
                    status: ret.status,
                    already_canceled: true,
                });
            }
            PurchaseReturnStatus::Completed => {
                return Err(ServiceError::InvalidOperation(format!(
                    "purchase return {} is already executed and cannot be canceled",
                    ret.return_no
                )));
            }
            PurchaseReturnStatus::PendingAudit | PurchaseReturnStatus::Audited => {}
        }

        let claimed = purchase_return::Entity::update_many()
            .col_expr(
                purchase_return::Column::Status,
                Expr::value(PurchaseReturnStatus::Canceled),
            )
            .col_expr(purchase_return::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_return::Column::Id.eq(ret.id))
            .filter(purchase_return::Column::Status.eq(ret.status))
            .exec(db)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "purchase return {} changed status concurrently",
                ret.return_no
            )));
        }

        Ok(CancelPurchaseReturnResult {
            return_id: ret.id,
            status: PurchaseReturnStatus::Canceled,
            already_canceled: false,
        })
    }
}
