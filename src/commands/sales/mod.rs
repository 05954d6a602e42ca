//! Sales fulfillment: order -> audit (reserve) -> ship (consume reservation)
//! -> optional reversal. While an order is audited or partially shipped, the
//! outstanding quantity of every line is held as reservation in the ledger.

pub mod audit_order_command;
pub mod cancel_order_command;
pub mod create_order_command;
pub mod precheck_shipment_command;
pub mod reverse_shipment_command;
pub mod ship_order_command;

pub use audit_order_command::AuditSalesOrderCommand;
pub use cancel_order_command::CancelSalesOrderCommand;
pub use create_order_command::CreateSalesOrderCommand;
pub use precheck_shipment_command::PrecheckShipmentCommand;
pub use reverse_shipment_command::ReverseShipmentCommand;
pub use ship_order_command::ShipSalesOrderCommand;

use crate::entities::sales_order::SalesOrderStatus;
use crate::entities::sales_order_line;
use rust_decimal::Decimal;

/// Header status as the pure function of line completeness.
pub(crate) fn status_from_lines(lines: &[sales_order_line::Model]) -> SalesOrderStatus {
    let all_shipped = lines.iter().all(|l| l.shipped_qty >= l.ordered_qty);
    if all_shipped {
        return SalesOrderStatus::Shipped;
    }
    if lines.iter().any(|l| l.shipped_qty > Decimal::ZERO) {
        SalesOrderStatus::PartiallyShipped
    } else {
        SalesOrderStatus::Audited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn line(ordered: Decimal, shipped: Decimal) -> sales_order_line::Model {
        sales_order_line::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            unit_price: dec!(1.00),
            ordered_qty: ordered,
            shipped_qty: shipped,
            amount: dec!(1.00),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn nothing_shipped_is_audited() {
        let lines = vec![line(dec!(10), dec!(0))];
        assert_eq!(status_from_lines(&lines), SalesOrderStatus::Audited);
    }

    #[test]
    fn partial_shipment_is_partially_shipped() {
        let lines = vec![line(dec!(10), dec!(6))];
        assert_eq!(status_from_lines(&lines), SalesOrderStatus::PartiallyShipped);

        let lines = vec![line(dec!(10), dec!(10)), line(dec!(4), dec!(0))];
        assert_eq!(status_from_lines(&lines), SalesOrderStatus::PartiallyShipped);
    }

    #[test]
    fn all_lines_full_is_shipped() {
        let lines = vec![line(dec!(10), dec!(10)), line(dec!(4), dec!(4))];
        assert_eq!(status_from_lines(&lines), SalesOrderStatus::Shipped);
    }
}
