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
    entities::purchase_order::{self, PurchaseOrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref PURCHASE_ORDERS_AUDITED: IntCounter = IntCounter::new(
        "purchase_orders_audited_total",
        "Total number of purchase orders audited"
    )
    .expect("metric can be created");
    static ref PURCHASE_ORDER_AUDIT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "purchase_order_audit_failures_total",
            "Total number of failed purchase order audits"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Approves a pending purchase order. Purchase orders do not pre-reserve, so
/// this is a pure status transition.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuditPurchaseOrderCommand {
    pub order_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub audited_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditPurchaseOrderResult {
    pub order_id: Uuid,
    pub status: PurchaseOrderStatus,
}

#[async_trait::async_trait]
impl Command for AuditPurchaseOrderCommand {
    type Result = AuditPurchaseOrderResult;

    #[instrument(name = "purchase_order_audit", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.run(db_pool.as_ref()).await;
        match &result {
            Ok(_) => {
                PURCHASE_ORDERS_AUDITED.inc();
                info!(order_id = %self.order_id, "purchase order audited");
                event_sender
                    .send(Event::PurchaseOrderAudited(self.order_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                PURCHASE_ORDER_AUDIT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl AuditPurchaseOrderCommand {
    async fn run(&self, db: &DbPool) -> Result<AuditPurchaseOrderResult, ServiceError> {
        self.validate()?;

        // A single guarded update doubles as the header lock: of several
        // concurrent audits exactly one matches the pending status.
        let claimed = purchase_order::Entity::update_many()
            .col_expr(
                purchase_order::Column::Status,
                Expr::value(PurchaseOrderStatus::Audited),
            )
            .col_expr(
                purchase_order::Column::AuditedBy,
                Expr::value(Some(self.audited_by.clone())),
            )
            .col_expr(
                purchase_order::Column::AuditedAt,
                Expr::value(Some(Utc::now())),
            )
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_order::Column::Id.eq(self.order_id))
            .filter(purchase_order::Column::Status.eq(PurchaseOrderStatus::PendingAudit))
            .exec(db)
            .await?;

        if claimed.rows_affected == 0 {
            let order = purchase_order::Entity::find_by_id(self.order_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("purchase order {}", self.order_id))
                })?;
            return Err(ServiceError::InvalidOperation(format!(
                "purchase order {} cannot be audited from status {:?}",
                order.order_no, order.status
            )));
        }

        Ok(AuditPurchaseOrderResult {
            order_id: self.order_id,
            status: PurchaseOrderStatus::Audited,
        })
    }
}
