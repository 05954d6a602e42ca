//! Read-side commands over the ledger: current balances and the movement
//! history. Both are pure queries; nothing here mutates.

pub mod get_balance_command;
pub mod list_movements_command;

pub use get_balance_command::GetStockBalanceCommand;
pub use list_movements_command::ListMovementsCommand;
