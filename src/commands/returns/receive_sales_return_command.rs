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
    ledger,
};

lazy_static! {
    static ref SALES_RETURNS_RECEIVED: IntCounter = IntCounter::new(
        "sales_returns_received_total",
        "Total number of sales returns received into quality control"
    )
    .expect("metric can be created");
    static ref SALES_RETURN_RECEIVE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "sales_return_receive_failures_total",
            "Total number of failed sales return receipts"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Books the physical arrival of an audited return into the QC holding
/// bucket. The goods are in the building but do not count as stock until QC
/// passes them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReceiveSalesReturnCommand {
    pub return_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub received_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveSalesReturnResult {
    pub return_id: Uuid,
    pub return_no: String,
    pub status: SalesReturnStatus,
}

#[async_trait::async_trait]
impl Command for ReceiveSalesReturnCommand {
    type Result = ReceiveSalesReturnResult;

    #[instrument(name = "sales_return_receive", skip(self, db_pool, event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let cmd = self.clone();
        let result = db_pool
            .transaction::<_, ReceiveSalesReturnResult, ServiceError>(|txn| {
                Box::pin(async move { cmd.receive_in_txn(txn).await })
            })
            .await
            .map_err(txn_error);

        match &result {
            Ok(received) => {
                SALES_RETURNS_RECEIVED.inc();
                info!(
                    return_no = %received.return_no,
                    "sales return received into QC"
                );
                event_sender
                    .send(Event::SalesReturnReceived(self.return_id))
                    .await
                    .map_err(ServiceError::EventError)?;
            }
            Err(e) => {
                SALES_RETURN_RECEIVE_FAILURES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }
}

impl ReceiveSalesReturnCommand {
    async fn receive_in_txn(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<ReceiveSalesReturnResult, ServiceError> {
        let ret = sales_return::Entity::find_by_id(self.return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sales return {}", self.return_id)))?;
        if ret.status != SalesReturnStatus::Audited {
            return Err(ServiceError::InvalidOperation(format!(
                "sales return {} cannot be received from status {:?}",
                ret.return_no, ret.status
            )));
        }

        let lines = sales_return_line::Entity::find()
            .filter(sales_return_line::Column::ReturnId.eq(ret.id))
            .all(txn)
            .await?;
        validate_against_shipment(txn, &ret.return_no, ret.shipment_id, &lines).await?;

        let now = Utc::now();
        // Status first; a failed QC booking rolls the transition back.
        let claimed = sales_return::Entity::update_many()
            .col_expr(
                sales_return::Column::Status,
                Expr::value(SalesReturnStatus::PendingQc),
            )
            .col_expr(
                sales_return::Column::ReceivedBy,
                Expr::value(Some(self.received_by.clone())),
            )
            .col_expr(sales_return::Column::ReceivedAt, Expr::value(Some(now)))
            .col_expr(sales_return::Column::UpdatedAt, Expr::value(now))
            .filter(sales_return::Column::Id.eq(ret.id))
            .filter(sales_return::Column::Status.eq(SalesReturnStatus::Audited))
            .exec(txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "sales return {} changed status concurrently",
                ret.return_no
            )));
        }

        for line in &lines {
            let qc = ledger::qc_increase(txn, ret.warehouse_id, line.product_id, line.qty).await?;
            info!(
                return_no = %ret.return_no,
                product_id = %line.product_id,
                qc_qty = %qc.qc_qty,
                "quantity parked in QC"
            );
        }

        Ok(ReceiveSalesReturnResult {
            return_id: ret.id,
            return_no: ret.return_no,
            status: SalesReturnStatus::PendingQc,
        })
    }
}
