//! Human-readable document numbers: `PREFIX` + UTC second timestamp + a
//! 4-digit random suffix. Uniqueness is still enforced by the database; the
//! suffix only makes same-second collisions unlikely.

use chrono::Utc;
use rand::Rng;

pub const PURCHASE_ORDER: &str = "PO";
pub const PURCHASE_INBOUND: &str = "PI";
pub const PURCHASE_RETURN: &str = "PR";
pub const SALES_ORDER: &str = "SO";
pub const SHIPMENT: &str = "SH";
pub const SALES_RETURN: &str = "SR";
pub const STOCK_COUNT: &str = "CK";
pub const COUNT_ADJUST_IN: &str = "CAI";
pub const COUNT_ADJUST_OUT: &str = "CAO";
pub const SHIPMENT_REVERSAL: &str = "RSI";
pub const INBOUND_REVERSAL: &str = "RPO";

pub fn generate(prefix: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("{}{}-{}", prefix, stamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_has_prefix_stamp_and_suffix() {
        let no = generate(SALES_ORDER);
        assert!(no.starts_with("SO"));
        // SO + 14 digit timestamp + "-" + 4 digits
        assert_eq!(no.len(), 2 + 14 + 1 + 4);
        let (_, tail) = no.split_at(no.len() - 4);
        let suffix: u16 = tail.parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn distinct_prefixes_never_collide() {
        assert_ne!(generate(COUNT_ADJUST_IN), generate(COUNT_ADJUST_OUT));
    }
}
