//! Stock counts. A pending count holds only counted quantities; execution
//! snapshots the book quantity per line, books the differences through at
//! most two adjustment documents (one per direction) and completes the count.

pub mod cancel_count_command;
pub mod create_count_command;
pub mod execute_count_command;

pub use cancel_count_command::CancelStockCountCommand;
pub use create_count_command::CreateStockCountCommand;
pub use execute_count_command::ExecuteStockCountCommand;
