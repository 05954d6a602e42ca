use std::sync::Arc;

use tracing::instrument;

use crate::commands::sales::audit_order_command::{AuditSalesOrderCommand, AuditSalesOrderResult};
use crate::commands::sales::cancel_order_command::{
    CancelSalesOrderCommand, CancelSalesOrderResult,
};
use crate::commands::sales::create_order_command::{
    CreateSalesOrderCommand, CreateSalesOrderResult,
};
use crate::commands::sales::precheck_shipment_command::{
    PrecheckShipmentCommand, PrecheckShipmentResult,
};
use crate::commands::sales::reverse_shipment_command::{
    ReverseShipmentCommand, ReverseShipmentResult,
};
use crate::commands::sales::ship_order_command::{ShipSalesOrderCommand, ShipSalesOrderResult};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Sales order lifecycle: create, audit (reserve), precheck, ship, reverse a
/// shipment, cancel (release).
#[derive(Clone)]
pub struct SalesOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SalesOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_order(
        &self,
        command: CreateSalesOrderCommand,
    ) -> Result<CreateSalesOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn audit_order(
        &self,
        command: AuditSalesOrderCommand,
    ) -> Result<AuditSalesOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn precheck_shipment(
        &self,
        command: PrecheckShipmentCommand,
    ) -> Result<PrecheckShipmentResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self, command))]
    pub async fn ship_order(
        &self,
        command: ShipSalesOrderCommand,
    ) -> Result<ShipSalesOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn reverse_shipment(
        &self,
        command: ReverseShipmentCommand,
    ) -> Result<ReverseShipmentResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        command: CancelSalesOrderCommand,
    ) -> Result<CancelSalesOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
