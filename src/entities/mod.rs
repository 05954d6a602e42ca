//! Database entities. Documents own their lines; the two balance tables are
//! shared mutable state, only ever touched through `crate::ledger`.

pub mod movement_log;
pub mod partner;
pub mod product;
pub mod qc_balance;
pub mod stock_balance;
pub mod warehouse;

pub mod purchase_inbound;
pub mod purchase_inbound_line;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod purchase_return;
pub mod purchase_return_line;

pub mod sales_order;
pub mod sales_order_line;
pub mod sales_return;
pub mod sales_return_line;
pub mod shipment;
pub mod shipment_line;

pub mod stock_count;
pub mod stock_count_line;
pub mod stock_document;
pub mod stock_document_line;
