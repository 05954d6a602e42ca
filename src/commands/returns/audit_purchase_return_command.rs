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
    static ref PURCHASE_RETURNS_AUDITED: IntCounter = IntCounter::new(
        "purchase_returns_audited_total",
        "Total number of purchase returns audited"
    )
    .expect("metric can be created");
    static ref PURCHASE_RETURN_AUDIT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_return_audit_failures_total",
            "Total number of failed purchase return audits"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Approves a pending purchase return. Stock is only touched at execution.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditPurchaseReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub audited_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditPurchaseReturnResult {
    pub return_id: Uuid,
    pub status: PurchaseReturnStatus,
}

#[async_trait::async_trait]
impl Command for AuditPurchaseReturnCommand {
    type Result = AuditPurchaseReturnResult;

    #[instrument(name = "purchase_return_audit", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(_) => {
                PURCHASE_RETURNS_AUDITED.inc();
                info!(return_id = %self.return_id, "purchase return audited");
                event_sender
                    .send(Event::PurchaseReturnAudited(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                PURCHASE_RETURN_AUDIT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl AuditPurchaseReturnCommand {
    async fn run(&self, db: &DbPool) -> Result<AuditPurchaseReturnResult, ServiceError> {
        self.validate()?;

        let claimed = purchase_return::Entity::update_many()
            .col_expr(
                purchase_return::Column::Status,
                Expr::value(PurchaseReturnStatus::Audited),
            )
            .col_expr(
                purchase_return::Column::AuditedBy,
                Expr::value(Some(self.audited_by.clone())),
            )
            .col_expr(
                purchase_return::Column::AuditedAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(purchase_return::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_return::Column::Id.eq(self.return_id))
            .filter(purchase_return::Column::Status.eq(PurchaseReturnStatus::PendingAudit))
            .exec(db)
            .await?;

        if claimed.rows_affected == 0 {
            let ret = purchase_return::Entity::find_by_id(self.return_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("purchase return {}", self.return_id))
                })?;
            return Err(ServiceError::InvalidOperation(format!(
                "purchase return {} cannot be audited from status {:?}",
                ret.return_no, ret.status
            )));
        }

        Ok(AuditPurchaseReturnResult {
            return_id: self.return_id,
            status: PurchaseReturnStatus::Audited,
        })
    }
}
