use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Position sizing utilities.
///
/// Capital is split into equal slots, one per portfolio position.
pub struct Sizing;

impl Sizing {
    /// Cash available to each of `portfolio_size` positions.
    pub fn slot_cash(cash: Decimal, portfolio_size: usize) -> Decimal {
        if portfolio_size == 0 || cash <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        cash / Decimal::from(portfolio_size as u64)
    }

    /// Whole shares affordable with `slot_cash` at `price`.
    pub fn quantity(slot_cash: Decimal, price: Decimal) -> u32 {
        if price <= Decimal::ZERO || slot_cash <= Decimal::ZERO {
            return 0;
        }
        (slot_cash / price).floor().to_u32().unwrap_or(0)
    }

    /// Limit price derived from a close, kept to paise precision.
    pub fn limit_price(close: f64) -> Option<Decimal> {
        if !close.is_finite() || close <= 0.0 {
            return None;
        }
        Decimal::from_f64_retain(close).map(|p| p.round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_slot_cash() {
        assert_eq!(Sizing::slot_cash(dec!(30000), 5), dec!(6000));
        assert_eq!(Sizing::slot_cash(dec!(30000), 0), Decimal::ZERO);
        assert_eq!(Sizing::slot_cash(dec!(-1), 5), Decimal::ZERO);
    }

    #[test]
    fn test_quantity_floors() {
        assert_eq!(Sizing::quantity(dec!(6000), dec!(612.35)), 9);
        assert_eq!(Sizing::quantity(dec!(6000), dec!(6000)), 1);
        assert_eq!(Sizing::quantity(dec!(6000), dec!(6000.05)), 0);
        assert_eq!(Sizing::quantity(dec!(6000), Decimal::ZERO), 0);
    }

    #[test]
    fn test_limit_price() {
        assert_eq!(Sizing::limit_price(612.35), Some(dec!(612.35)));
        assert_eq!(Sizing::limit_price(1234.5678), Some(dec!(1234.57)));
        assert_eq!(Sizing::limit_price(0.0), None);
        assert_eq!(Sizing::limit_price(f64::NAN), None);
    }
}
