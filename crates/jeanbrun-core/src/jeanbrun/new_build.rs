use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::jeanbrun::RentTier;
use crate::tables::JeanbrunTable;
use crate::types::{round_money, Money, Rate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuildResult {
    pub tier: RentTier,
    /// Depreciable base (building share of the price)
    pub base: Money,
    pub gross_amortization: Money,
    pub net_amortization: Money,
    pub rate: Rate,
    pub cap: Money,
    pub cap_applied: bool,
}

/// Annual Jeanbrun amortization for a newly built property.
///
/// A non-positive price yields zero amounts but still reports the tier's
/// rate and cap.
pub fn calculate_new_build(table: &JeanbrunTable, price: Money, tier: RentTier) -> NewBuildResult {
    let params = table.new_build.get(tier);

    if price <= Decimal::ZERO {
        return NewBuildResult {
            tier,
            base: Decimal::ZERO,
            gross_amortization: Decimal::ZERO,
            net_amortization: Decimal::ZERO,
            rate: params.rate,
            cap: params.cap,
            cap_applied: false,
        };
    }

    let base = price * table.base_ratio;
    let gross = base * params.rate;
    let cap_applied = gross > params.cap;
    let net = gross.min(params.cap);

    NewBuildResult {
        tier,
        base: round_money(base),
        gross_amortization: round_money(gross),
        net_amortization: round_money(net),
        rate: params.rate,
        cap: params.cap,
        cap_applied,
    }
}
