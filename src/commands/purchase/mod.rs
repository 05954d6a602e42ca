//! Purchase fulfillment: order -> inbound receipt, with partial-receipt
//! tracking and inbound reversal. Audit never touches stock; purchase orders
//! do not pre-reserve.

pub mod audit_order_command;
pub mod cancel_order_command;
pub mod create_order_command;
pub mod receive_order_command;
pub mod reverse_inbound_command;

pub use audit_order_command::AuditPurchaseOrderCommand;
pub use cancel_order_command::CancelPurchaseOrderCommand;
pub use create_order_command::CreatePurchaseOrderCommand;
pub use receive_order_command::ReceivePurchaseOrderCommand;
pub use reverse_inbound_command::ReverseInboundCommand;

use crate::entities::purchase_order::PurchaseOrderStatus;
use crate::entities::purchase_order_line;
use rust_decimal::Decimal;

/// Header status as the pure function of line completeness: every line fully
/// received means completed, any received quantity means partially received,
/// otherwise the order stays audited.
pub(crate) fn status_from_lines(lines: &[purchase_order_line::Model]) -> PurchaseOrderStatus {
    let all_received = lines.iter().all(|l| l.received_qty >= l.ordered_qty);
    if all_received {
        return PurchaseOrderStatus::Completed;
    }
    if lines.iter().any(|l| l.received_qty > Decimal::ZERO) {
        PurchaseOrderStatus::PartiallyReceived
    } else {
        PurchaseOrderStatus::Audited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn line(ordered: Decimal, received: Decimal) -> purchase_order_line::Model {
        purchase_order_line::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            unit_price: dec!(1.00),
            ordered_qty: ordered,
            received_qty: received,
            amount: dec!(1.00),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn untouched_lines_stay_audited() {
        let lines = vec![line(dec!(5), dec!(0)), line(dec!(3), dec!(0))];
        assert_eq!(status_from_lines(&lines), PurchaseOrderStatus::Audited);
    }

    #[test]
    fn any_receipt_short_of_full_is_partial() {
        let lines = vec![line(dec!(5), dec!(2)), line(dec!(3), dec!(0))];
        assert_eq!(
            status_from_lines(&lines),
            PurchaseOrderStatus::PartiallyReceived
        );

        let lines = vec![line(dec!(5), dec!(5)), line(dec!(3), dec!(2))];
        assert_eq!(
            status_from_lines(&lines),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn every_line_full_is_completed() {
        let lines = vec![line(dec!(5), dec!(5)), line(dec!(3), dec!(3))];
        assert_eq!(status_from_lines(&lines), PurchaseOrderStatus::Completed);
    }
}
