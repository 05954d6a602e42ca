use crate::{db::DbPool, errors::ServiceError, events::EventSender};
use async_trait::async_trait;
use sea_orm::TransactionError;
use std::sync::Arc;

/// One fulfillment action, encapsulated as a command object.
///
/// A command validates its input, runs every stock mutation and document
/// update of the action inside one transaction, and publishes domain events
/// once the transaction committed. Nothing is written before all
/// preconditions for the whole batch are confirmed.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Unwraps `sea_orm`'s transaction wrapper back into the service taxonomy.
pub(crate) fn txn_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(e) => ServiceError::DatabaseError(e),
        TransactionError::Transaction(e) => e,
    }
}

/// Line amount as the original documents carry it: price times quantity,
/// rounded half-up to 2 decimal places.
pub(crate) fn line_amount(
    unit_price: rust_decimal::Decimal,
    qty: rust_decimal::Decimal,
) -> rust_decimal::Decimal {
    (unit_price * qty).round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

pub mod counts;
pub mod inventory;
pub mod purchase;
pub mod returns;
pub mod sales;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(1.005), dec!(1), dec!(1.01) ; "midpoint rounds away from zero")]
    #[test_case(dec!(2.50), dec!(3), dec!(7.50) ; "exact product stays exact")]
    #[test_case(dec!(0.333), dec!(3), dec!(1.00) ; "sub-cent precision folds into cents")]
    #[test_case(dec!(19.99), dec!(0.5), dec!(10.00) ; "fractional quantity")]
    fn line_amount_rounds_half_up_to_cents(price: Decimal, qty: Decimal, want: Decimal) {
        assert_eq!(line_amount(price, qty), want);
    }
}
