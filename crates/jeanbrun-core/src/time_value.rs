use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::types::{Money, Rate};

/// Discount factor `(1 + rate)^-periods`, zero once the growth factor no
/// longer fits in a Decimal.
pub fn discount_factor(rate: Rate, periods: u32) -> Decimal {
    match (Decimal::ONE + rate).checked_powu(u64::from(periods)) {
        Some(growth) if !growth.is_zero() => Decimal::ONE / growth,
        _ => Decimal::ZERO,
    }
}

/// Level payment that repays `principal` over `periods` at `rate` per period.
pub fn pmt(rate: Rate, periods: u32, principal: Money) -> Money {
    if periods == 0 {
        return Decimal::ZERO;
    }
    if rate.is_zero() {
        return principal / Decimal::from(periods);
    }
    let denominator = Decimal::ONE - discount_factor(rate, periods);
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    principal * rate / denominator
}

/// Principal repaid by a level `payment` over `periods` at `rate` per period.
pub fn pv(rate: Rate, periods: u32, payment: Money) -> Money {
    if rate.is_zero() {
        return payment * Decimal::from(periods);
    }
    payment * (Decimal::ONE - discount_factor(rate, periods)) / rate
}

/// Per-period rate at which `payment` over `periods` repays `principal`.
///
/// Starts from the closed-form approximation `2(nP - C) / (C(n + 1))` and
/// applies `refinements` Newton-Raphson corrections on `pv(r) - principal`.
pub fn implied_rate(principal: Money, payment: Money, periods: u32, refinements: u32) -> Rate {
    if principal <= Decimal::ZERO || periods == 0 {
        return Decimal::ZERO;
    }
    let n = Decimal::from(periods);
    let total_paid = payment * n;
    if total_paid <= principal {
        return Decimal::ZERO;
    }

    let mut rate = dec!(2) * (total_paid - principal) / (principal * (n + Decimal::ONE));

    for _ in 0..refinements {
        if rate <= Decimal::ZERO {
            break;
        }
        let df = discount_factor(rate, periods);
        let value = payment * (Decimal::ONE - df) / rate - principal;
        // d/dr of P(1 - (1+r)^-n)/r
        let derivative =
            payment * (n * df / (Decimal::ONE + rate) * rate - (Decimal::ONE - df)) / (rate * rate);
        if derivative.is_zero() {
            break;
        }
        rate -= value / derivative;
    }

    rate.max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmt_reference_mortgage() {
        // 200k over 20 years at 3.5% nominal: 1,159.92 per month
        let payment = pmt(dec!(0.035) / dec!(12), 240, dec!(200_000));
        assert!((payment - dec!(1159.92)).abs() < dec!(0.01), "got {payment}");
    }

    #[test]
    fn test_pmt_zero_rate_is_linear() {
        assert_eq!(pmt(Decimal::ZERO, 240, dec!(120_000)), dec!(500));
    }

    #[test]
    fn test_discount_factor_vanishes_on_overflow() {
        assert_eq!(discount_factor(dec!(5), 240), Decimal::ZERO);
        // Interest-only payment once the discount factor is gone
        assert_eq!(pmt(dec!(5), 240, dec!(200_000)), dec!(1_000_000));
    }

    #[test]
    fn test_pmt_zero_periods() {
        assert_eq!(pmt(dec!(0.01), 0, dec!(1_000)), Decimal::ZERO);
    }

    #[test]
    fn test_pv_inverts_pmt() {
        let rate = dec!(0.04) / dec!(12);
        let payment = pmt(rate, 300, dec!(250_000));
        let principal = pv(rate, 300, payment);
        assert!((principal - dec!(250_000)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_implied_rate_recovers_nominal_rate() {
        let rate = dec!(0.035) / dec!(12);
        let payment = pmt(rate, 240, dec!(200_000));
        let implied = implied_rate(dec!(200_000), payment, 240, 3);
        assert!((implied - rate).abs() < dec!(0.000001), "got {implied}");
    }

    #[test]
    fn test_implied_rate_without_interest() {
        assert_eq!(implied_rate(dec!(12_000), dec!(100), 120, 3), Decimal::ZERO);
    }
}
