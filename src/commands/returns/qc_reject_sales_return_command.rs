use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    commands::{returns::validate_against_shipment, txn_error, Command},
    db::DbPool,
    entities::sales_return::{self, SalesReturnStatus},
    entities::sales_return_line,
    errors::ServiceError,
    events::{Event, EventSender},
    ledger,
};

lazy_static! {
    static ref SALES_RETURNS_QC_REJECTED: IntCounter = IntCounter::new(
        "sales_returns_qc_rejected_total",
        "Total number of sales returns rejected by quality control"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_QC_REJECT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_qc_reject_failures_total",
            "Total number of failed sales return QC rejections"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Quality control rejects the received goods: the QC bucket drains with no
/// stock effect and no movement. The rejected quantities still count toward
/// the shipment line return cap because the goods went back to the customer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QcRejectSalesReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub qc_by: String,
    #[validate(length(min = 1, max = 500, message = "a rejection needs a reason"))]
    pub qc_remark: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QcRejectSalesReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub status: SalesReturnStatus,
}

#[async_trait::async_trait]
impl Command for QcRejectSalesReturnCommand {
    type Result = QcRejectSalesReturnResult;

    #[instrument(name = "sales_return_qc_reject", skip(self, db_pool, event_sender), fields(return_id = %self.return_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, QcRejectSalesReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.reject_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(rejected) => {
                SALES_RETURNS_QC_REJECTED.inc();
                warn!(
                    return_no = %rejected.return_no,
                    qc_remark = %self.qc_remark,
                    "sales return rejected by QC"
                );
                event_sender
                    .send(Event::SalesReturnRejected(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_RETURN_QC_REJECT_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl QcRejectSalesReturnCommand {
    async fn reject_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<QcRejectSalesReturnResult, ServiceError> {
        let ret = sales_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales return {}", self.return_id)))?;
        if ret.status != SalesReturnStatus::PendingQc {
            return Err(ServiceError::InvalidOperation(format!(
                "sales return {} cannot be rejected from status {:?}",
                ret.return_no, ret.status
            )));
        }

        let lines = sales_return_line::Entity::find()
            .filter(sales_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;
        validate_against_shipment(txn, &ret.return_no, ret.shipment_id, &lines).await?;

        let now = Utc::now();
        let claimed = sales_return::Entity::update_many()
            .col_expr(
                sales_return::Column::Status,
                Expr::value(SalesReturnStatus::QcRejected),
            )
            .col_expr(
                sales_return::Column::QcBy,
                Expr::value(Some(self.qc_by.clone())),
            )
            .col_expr(sales_return::Column::QcAt, Expr::value(Some(now)))
            .col_expr(
                sales_return::Column::QcRemark,
                Expr::value(Some(self.qc_remark.clone())),
            )
            .col_expr(sales_return::Column::UpdatedAt, Expr::value(now))
            .filter(sales_return::Column::Id.eq(ret.id))
            .filter(sales_return::Column::Status.eq(SalesReturnStatus::PendingQc))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales return {} changed status concurrently",
                ret.return_no
            )));
        }

        for line in &lines {
            ledger::qc_decrease(txn, ret.warehouse_id, line.product_id, line.qty).await?;
        }

        Ok(QcRejectSalesReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            status: SalesReturnStatus::QcRejected,
        })
    }
}
