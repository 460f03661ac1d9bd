use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values, in euros. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.30 = 30%). Never as percentages.
pub type Rate = Decimal;

/// Number of fiscal parts (1, 1.5, 2, 2.5, ...)
pub type Parts = Decimal;

/// Round to the nearest euro, halves away from zero.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Round to the cent. Used for monthly loan figures.
pub fn round_cents(amount: Money) -> Money {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a rate to four decimals (0.1234 = 12.34%).
pub fn round_rate(rate: Rate) -> Rate {
    rate.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// `numerator / denominator`, or zero when the denominator is not positive.
pub(crate) fn ratio_or_zero(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator > Decimal::ZERO {
        numerator / denominator
    } else {
        Decimal::ZERO
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub tax_year: i32,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    tax_year: i32,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            tax_year,
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_halves_away_from_zero() {
        assert_eq!(round_money(dec!(8165.5)), dec!(8166));
        assert_eq!(round_money(dec!(8165.48)), dec!(8165));
        assert_eq!(round_money(dec!(-2.5)), dec!(-3));
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(dec!(1159.9154)), dec!(1159.92));
    }

    #[test]
    fn test_ratio_or_zero_guards_denominator() {
        assert_eq!(ratio_or_zero(dec!(10), dec!(0)), Decimal::ZERO);
        assert_eq!(ratio_or_zero(dec!(10), dec!(-4)), Decimal::ZERO);
        assert_eq!(ratio_or_zero(dec!(10), dec!(4)), dec!(2.5));
    }
}
