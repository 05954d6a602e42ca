use std::sync::Arc;

use tracing::instrument;

use crate::commands::returns::audit_purchase_return_command::{
    AuditPurchaseReturnCommand, AuditPurchaseReturnResult,
};
use crate::commands::returns::audit_sales_return_command::{
    AuditSalesReturnCommand, AuditSalesReturnResult,
};
use crate::commands::returns::cancel_purchase_return_command::{
    CancelPurchaseReturnCommand, CancelPurchaseReturnResult,
};
use crate::commands::returns::cancel_sales_return_command::{
    CancelSalesReturnCommand, CancelSalesReturnResult,
};
use crate::commands::returns::create_purchase_return_command::{
    CreatePurchaseReturnCommand, CreatePurchaseReturnResult,
};
use crate::commands::returns::create_sales_return_command::{
    CreateSalesReturnCommand, CreateSalesReturnResult,
};
use crate::commands::returns::execute_purchase_return_command::{
    ExecutePurchaseReturnCommand, ExecutePurchaseReturnResult,
};
use crate::commands::returns::qc_pass_sales_return_command::{
    QcPassSalesReturnCommand, QcPassSalesReturnResult,
};
use crate::commands::returns::qc_reject_sales_return_command::{
    QcRejectSalesReturnCommand, QcRejectSalesReturnResult,
};
use crate::commands::returns::receive_sales_return_command::{
    ReceiveSalesReturnCommand, ReceiveSalesReturnResult,
};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Both return directions: purchase returns back to suppliers and sales
/// returns from customers (with the QC holding step).
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_purchase_return(
        &self,
        command: CreatePurchaseReturnCommand,
    ) -> Result<CreatePurchaseReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn audit_purchase_return(
        &self,
        command: AuditPurchaseReturnCommand,
    ) -> Result<AuditPurchaseReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn execute_purchase_return(
        &self,
        command: ExecutePurchaseReturnCommand,
    ) -> Result<ExecutePurchaseReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_purchase_return(
        &self,
        command: CancelPurchaseReturnCommand,
    ) -> Result<CancelPurchaseReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn create_sales_return(
        &self,
        command: CreateSalesReturnCommand,
    ) -> Result<CreateSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn audit_sales_return(
        &self,
        command: AuditSalesReturnCommand,
    ) -> Result<AuditSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn receive_sales_return(
        &self,
        command: ReceiveSalesReturnCommand,
    ) -> Result<ReceiveSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn qc_pass_sales_return(
        &self,
        command: QcPassSalesReturnCommand,
    ) -> Result<QcPassSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn qc_reject_sales_return(
        &self,
        command: QcRejectSalesReturnCommand,
    ) -> Result<QcRejectSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_sales_return(
        &self,
        command: CancelSalesReturnCommand,
    ) -> Result<CancelSalesReturnResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
