//! Money helpers. Amounts are `Decimal` and are rounded to two places once,
//! at the point they are stored.

use rust_decimal::{Decimal, RoundingStrategy};

pub const MONEY_SCALE: u32 = 2;

/// Round to cents, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `part` as a percentage of `whole`, rounded to two places; zero when
/// `whole` is zero
pub fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round_money(part * Decimal::ONE_HUNDRED / whole)
}

/// `percent` of `amount`, rounded to cents
pub fn apply_percentage(amount: Decimal, percent: Decimal) -> Decimal {
    round_money(amount * percent / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(d("2.345")), d("2.35"));
        assert_eq!(round_money(d("2.344")), d("2.34"));
        assert_eq!(round_money(d("-2.345")), d("-2.35"));
    }

    #[test]
    fn percentage_helpers() {
        assert_eq!(apply_percentage(d("33.33"), d("70")), d("23.33"));
        assert_eq!(percentage_of(d("1"), d("3")), d("33.33"));
        assert_eq!(percentage_of(d("5"), Decimal::ZERO), Decimal::ZERO);
    }
}
