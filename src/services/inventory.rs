use std::sync::Arc;

use tracing::instrument;

use crate::commands::inventory::get_balance_command::{GetStockBalanceCommand, StockBalanceView};
use crate::commands::inventory::list_movements_command::{ListMovementsCommand, MovementPage};
use crate::commands::Command;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;

/// Read-side access to balances and the movement log.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_balance(
        &self,
        command: GetStockBalanceCommand,
    ) -> Result<StockBalanceView, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        command: ListMovementsCommand,
    ) -> Result<MovementPage, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
