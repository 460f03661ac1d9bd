use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::jeanbrun::RentTier;
use crate::tables::JeanbrunTable;
use crate::types::{round_money, Money, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleRenovation {
    pub tier: RentTier,
    /// Purchase price plus works
    pub total_price: Money,
    pub base: Money,
    pub gross_amortization: Money,
    pub net_amortization: Money,
    pub rate: Rate,
    pub cap: Money,
    pub cap_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IneligibleRenovation {
    pub required_renovation: Money,
    pub shortfall: Money,
    pub message: String,
}

/// Either the works reach the threshold and the property is depreciated, or
/// they fall short and nothing else is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenovatedOutcome {
    Eligible(EligibleRenovation),
    Ineligible(IneligibleRenovation),
}

/// Minimum works amount for a renovated property to qualify.
pub fn required_renovation(table: &JeanbrunTable, purchase_price: Money) -> Money {
    if purchase_price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    purchase_price * table.renovation_threshold
}

/// Eligibility gate then annual amortization for a renovated property.
pub fn calculate_renovated(
    table: &JeanbrunTable,
    purchase_price: Money,
    works: Money,
    tier: RentTier,
) -> RenovatedOutcome {
    let required = required_renovation(table, purchase_price);

    if works < required {
        let shortfall = round_money(required - works);
        return RenovatedOutcome::Ineligible(IneligibleRenovation {
            required_renovation: round_money(required),
            shortfall,
            message: format!(
                "Les travaux doivent représenter au moins {} % du prix d'acquisition, \
                 soit {} €. Il manque {} € de travaux pour être éligible.",
                (table.renovation_threshold * Decimal::ONE_HUNDRED).normalize(),
                round_money(required),
                shortfall
            ),
        });
    }

    let total_price = purchase_price.max(Decimal::ZERO) + works;
    let base = total_price * table.base_ratio;
    let rate = *table.renovated_rates.get(tier);
    let gross = base * rate;
    let cap = table.renovated_cap;
    let cap_applied = gross > cap;

    RenovatedOutcome::Eligible(EligibleRenovation {
        tier,
        total_price: round_money(total_price),
        base: round_money(base),
        gross_amortization: round_money(gross),
        net_amortization: round_money(gross.min(cap)),
        rate,
        cap,
        cap_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;
    use rust_decimal_macros::dec;

    fn table() -> JeanbrunTable {
        TaxTables::default().jeanbrun
    }

    #[test]
    fn test_works_below_threshold_are_ineligible() {
        // 37,500 of works on 150,000 is 25%, 45,000 required
        match calculate_renovated(&table(), dec!(150_000), dec!(37_500), RentTier::Intermediate) {
            RenovatedOutcome::Ineligible(r) => {
                assert_eq!(r.required_renovation, dec!(45_000));
                assert_eq!(r.shortfall, dec!(7_500));
                assert!(r.message.contains("7500"));
            }
            RenovatedOutcome::Eligible(_) => panic!("25% of works should not qualify"),
        }
    }

    #[test]
    fn test_eligible_large_renovation_hits_single_cap() {
        match calculate_renovated(&table(), dec!(400_000), dec!(150_000), RentTier::Intermediate) {
            RenovatedOutcome::Eligible(r) => {
                assert_eq!(r.total_price, dec!(550_000));
                assert_eq!(r.base, dec!(440_000));
                assert_eq!(r.gross_amortization, dec!(13_200));
                assert_eq!(r.net_amortization, dec!(10_700));
                assert!(r.cap_applied);
            }
            RenovatedOutcome::Ineligible(r) => panic!("expected eligible, got {r:?}"),
        }
    }

    #[test]
    fn test_cap_is_shared_by_all_tiers() {
        for tier in [RentTier::Intermediate, RentTier::Social, RentTier::VerySocial] {
            if let RenovatedOutcome::Eligible(r) =
                calculate_renovated(&table(), dec!(400_000), dec!(150_000), tier)
            {
                assert_eq!(r.cap, dec!(10_700));
                assert_eq!(r.net_amortization, dec!(10_700));
            } else {
                panic!("expected eligible for {tier:?}");
            }
        }
    }

    #[test]
    fn test_threshold_exactly_met_is_eligible() {
        // 200k + 60k = 260k, base 208k, 3.5% = 7,280
        match calculate_renovated(&table(), dec!(200_000), dec!(60_000), RentTier::Social) {
            RenovatedOutcome::Eligible(r) => {
                assert_eq!(r.gross_amortization, dec!(7_280));
                assert_eq!(r.net_amortization, dec!(7_280));
                assert!(!r.cap_applied);
            }
            RenovatedOutcome::Ineligible(_) => panic!("30% of works should qualify"),
        }
    }

    #[test]
    fn test_required_renovation_for_non_positive_price() {
        assert_eq!(required_renovation(&table(), dec!(0)), Decimal::ZERO);
        assert_eq!(required_renovation(&table(), dec!(-10)), Decimal::ZERO);
    }
}
