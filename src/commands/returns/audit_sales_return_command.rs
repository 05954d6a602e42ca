use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{returns::validate_against_shipment, txn_error, Command},
    db::DbPool,
    entities::sales_return::{self, SalesReturnStatus},
    entities::sales_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref SALES_RETURNS_AUDITED: IntCounter = IntCounter::new(
        "sales_returns_audited_total",
        "Total number of sales returns audited"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_AUDIT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_audit_failures_total",
            "Total number of failed sales return audits"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Approves a pending sales return. The shipment trace is re-validated here
/// because other returns against the same shipment may have landed since
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditSalesReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub audited_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditSalesReturnResult {
    pub return_id: Uuid,
    pub status: SalesReturnStatus,
}

#[async_trait::async_trait]
impl Command for AuditSalesReturnCommand {
    type Result = AuditSalesReturnResult;

    #[instrument(name = "sales_return_audit", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, AuditSalesReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.audit_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(_) => {
                SALES_RETURNS_AUDITED.inc();
                info!(return_id = %self.return_id, "sales return audited");
                event_sender
                    .send(Event::SalesReturnAudited(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_RETURN_AUDIT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl AuditSalesReturnCommand {
    async fn audit_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<AuditSalesReturnResult, ServiceError> {
        let ret = sales_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales return {}", self.return_id)))?;
        if ret.status != SalesReturnStatus::PendingAudit {
            return Err(ServiceError::InvalidOperation(format!(
                "sales return {} cannot be audited from status {:?}",
                ret.return_no, ret.status
            )));
        }

        let lines = sales_return_line::Entity::find()
            .filter(sales_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;
        validate_against_shipment(txn, &ret.return_no, ret.shipment_id, &lines).await?;

        let claimed = sales_return::Entity::update_many()
            .col_expr(
                sales_return::Column::Status,
                Expr::value(SalesReturnStatus::Audited),
            )
            .col_expr(
                sales_return::Column::AuditedBy,
                Expr::value(Some(self.audited_by.clone())),
            )
            .col_expr(sales_return::Column::AuditedAt, Expr::value(Some(Utc::now())))
            .col_expr(sales_return::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sales_return::Column::Id.eq(ret.id))
            .filter(sales_return::Column::Status.eq(SalesReturnStatus::PendingAudit))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales return {} changed status concurrently",
                ret.return_no
            )));
        }

        Ok(AuditSalesReturnResult {
            return_id: ret.id,
            status: SalesReturnStatus::Audited,
        })
    }
}
