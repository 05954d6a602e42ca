use std::sync::Arc;

use tracing::instrument;

use crate::commands::counts::cancel_count_command::{
    CancelStockCountCommand, CancelStockCountResult,
};
use crate::commands::counts::create_count_command::{
    CreateStockCountCommand, CreateStockCountResult,
};
use crate::commands::counts::execute_count_command::{
    ExecuteStockCountCommand, ExecuteStockCountResult,
};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Stock count lifecycle: create, execute (book the differences), cancel.
#[derive(Clone)]
pub struct StockCountService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockCountService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, command))]
    pub async fn create_count(
        &self,
        command: CreateStockCountCommand,
    ) -> Result<CreateStockCountResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn execute_count(
        &self,
        command: ExecuteStockCountCommand,
    ) -> Result<ExecuteStockCountResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_count(
        &self,
        command: CancelStockCountCommand,
    ) -> Result<CancelStockCountResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
