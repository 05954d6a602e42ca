use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::Command, db::DbPool, errors::ServiceError, events::EventSender, ledger,
};

/// Reads one stock balance. A pair that never moved reports all-zero rather
/// than not-found, so callers need not distinguish "no row" from "empty".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetStockBalanceCommand {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StockBalanceView {
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub on_hand_qty: Decimal,
    pub reserved_qty: Decimal,
    pub available_qty: Decimal,
    pub qc_qty: Decimal,
}

#[async_trait::async_trait]
impl Command for GetStockBalanceCommand {
    type Result = StockBalanceView;

    #[instrument(name = "stock_balance_get", skip(self, db_pool, _event_sender))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        _event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let balance = ledger::find_balance(db, self.warehouse_id, self.product_id).await?;
        let qc = ledger::find_qc_balance(db, self.warehouse_id, self.product_id).await?;

        let (on_hand, reserved) = balance
            .map(|b| (b.on_hand_qty, b.reserved_qty))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        Ok(StockBalanceView {
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            on_hand_qty: on_hand,
            reserved_qty: reserved,
            available_qty: on_hand - reserved,
            qc_qty: qc.map(|q| q.qc_qty).unwrap_or(Decimal::ZERO),
        })
    }
}
