use std::sync::Arc;

use tracing::instrument;

use crate::commands::purchase::audit_order_command::{
    AuditPurchaseOrderCommand, AuditPurchaseOrderResult,
};
use crate::commands::purchase::cancel_order_command::{
    CancelPurchaseOrderCommand, CancelPurchaseOrderResult,
};
use crate::commands::purchase::create_order_command::{
    CreatePurchaseOrderCommand, CreatePurchaseOrderResult,
};
use crate::commands::purchase::receive_order_command::{
    ReceivePurchaseOrderCommand, ReceivePurchaseOrderResult,
};
use crate::commands::purchase::reverse_inbound_command::{
    ReverseInboundCommand, ReverseInboundResult,
};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Purchase order lifecycle: create, audit, receive (with token-keyed
/// idempotency), reverse a receipt, cancel.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_order(
        &self,
        command: CreatePurchaseOrderCommand,
    ) -> Result<CreatePurchaseOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn audit_order(
        &self,
        command: AuditPurchaseOrderCommand,
    ) -> Result<AuditPurchaseOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn receive_order(
        &self,
        command: ReceivePurchaseOrderCommand,
    ) -> Result<ReceivePurchaseOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn reverse_inbound(
        &self,
        command: ReverseInboundCommand,
    ) -> Result<ReverseInboundResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        command: CancelPurchaseOrderCommand,
    ) -> Result<CancelPurchaseOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
