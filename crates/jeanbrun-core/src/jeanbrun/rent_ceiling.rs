use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::jeanbrun::{FiscalZone, RentTier};
use crate::tables::RentCeilingTable;
use crate::types::{round_money, Money, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentCeiling {
    pub zone: FiscalZone,
    pub tier: RentTier,
    pub per_square_meter: Money,
    pub surface_coefficient: Decimal,
    pub tier_coefficient: Rate,
    pub monthly_ceiling: Money,
}

/// Maximum monthly rent (excluding charges) for a surface in a zone and tier.
///
/// The surface coefficient `base + numerator / surface` is capped and rounded
/// to two decimals; a non-positive surface yields a zero ceiling.
pub fn monthly_rent_ceiling(
    table: &RentCeilingTable,
    zone: FiscalZone,
    tier: RentTier,
    surface: Decimal,
) -> RentCeiling {
    let per_square_meter = *table.per_square_meter.get(zone);
    let tier_coefficient = *table.tier_coefficients.get(tier);

    let surface_coefficient = if surface > Decimal::ZERO {
        (table.surface_coefficient_base + table.surface_coefficient_numerator / surface)
            .min(table.surface_coefficient_max)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };

    let monthly = per_square_meter * surface_coefficient * surface.max(Decimal::ZERO) * tier_coefficient;

    RentCeiling {
        zone,
        tier,
        per_square_meter,
        surface_coefficient,
        tier_coefficient,
        monthly_ceiling: round_money(monthly),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;
    use rust_decimal_macros::dec;

    fn table() -> RentCeilingTable {
        TaxTables::default().rent_ceilings
    }

    #[test]
    fn test_zone_a_50m2_intermediate() {
        // coefficient 0.7 + 19/50 = 1.08; 14.03 * 1.08 * 50 = 757.62
        let c = monthly_rent_ceiling(&table(), FiscalZone::A, RentTier::Intermediate, dec!(50));
        assert_eq!(c.surface_coefficient, dec!(1.08));
        assert_eq!(c.monthly_ceiling, dec!(758));
    }

    #[test]
    fn test_social_tier_lowers_ceiling() {
        // 757.62 * 0.80 = 606.10
        let c = monthly_rent_ceiling(&table(), FiscalZone::A, RentTier::Social, dec!(50));
        assert_eq!(c.monthly_ceiling, dec!(606));
    }

    #[test]
    fn test_small_surface_coefficient_is_capped() {
        let c = monthly_rent_ceiling(&table(), FiscalZone::B1, RentTier::Intermediate, dec!(20));
        assert_eq!(c.surface_coefficient, dec!(1.2));
    }

    #[test]
    fn test_zero_surface() {
        let c = monthly_rent_ceiling(&table(), FiscalZone::C, RentTier::Intermediate, dec!(0));
        assert_eq!(c.monthly_ceiling, Decimal::ZERO);
    }
}
