//! Thin façades over the command layer, one per document family. Handlers
//! talk to these; the services own nothing but the shared database pool and
//! event channel they hand to each command.

pub mod inventory;
pub mod purchase_orders;
pub mod returns;
pub mod sales_orders;
pub mod stock_counts;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;

pub use inventory::InventoryService;
pub use purchase_orders::PurchaseOrderService;
pub use returns::ReturnService;
pub use sales_orders::SalesOrderService;
pub use stock_counts::StockCountService;

/// Everything the HTTP surface needs, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub purchase_orders: PurchaseOrderService,
    pub sales_orders: SalesOrderService,
    pub returns: ReturnService,
    pub stock_counts: StockCountService,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            inventory: InventoryService::new(db_pool.clone(), event_sender.clone()),
            purchase_orders: PurchaseOrderService::new(db_pool.clone(), event_sender.clone()),
            sales_orders: SalesOrderService::new(db_pool.clone(), event_sender.clone()),
            returns: ReturnService::new(db_pool.clone(), event_sender.clone()),
            stock_counts: StockCountService::new(db_pool, event_sender),
        }
    }
}
