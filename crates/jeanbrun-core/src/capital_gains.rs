use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tables::{AbatementStep, CapitalGainsTable, SurtaxBracket};
use crate::types::{ratio_or_zero, round_money, round_rate, Money, Rate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalGainsInput {
    pub sale_price: Money,
    pub purchase_price: Money,
    /// Actual acquisition fees; the flat rate applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_fees: Option<Money>,
    /// Actual works; the flat allowance applies when absent and the holding
    /// period is long enough
    #[serde(skip_serializing_if = "Option::is_none")]
    pub works: Option<Money>,
    /// Full years of ownership
    pub holding_years: u32,
    /// Depreciation deducted while the property was rented
    #[serde(default)]
    pub depreciation_claimed: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalGainsResult {
    pub acquisition_fees: Money,
    pub works: Money,
    pub depreciation_reintegrated: Money,
    pub acquisition_cost: Money,
    pub gross_gain: Money,
    pub income_tax_abatement: Rate,
    pub social_abatement: Rate,
    pub income_tax_base: Money,
    pub social_base: Money,
    pub income_tax: Money,
    pub social_charges: Money,
    pub surtax: Money,
    pub total_tax: Money,
    pub effective_rate: Rate,
    pub net_proceeds: Money,
    pub exempt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exemption_reason: Option<String>,
}

fn cumulative_abatement(steps: &[AbatementStep], holding_years: u32) -> Rate {
    let total: Rate = steps
        .iter()
        .filter(|s| holding_years >= s.first_year)
        .map(|s| Decimal::from(holding_years.min(s.last_year) - s.first_year + 1) * s.annual_rate)
        .sum();
    total.min(Decimal::ONE)
}

/// Abatement on the income-tax component; 100% at 22 years.
pub fn income_tax_abatement(table: &CapitalGainsTable, holding_years: u32) -> Rate {
    cumulative_abatement(&table.income_tax_abatement, holding_years)
}

/// Abatement on the social-charges component; 100% at 30 years.
pub fn social_abatement(table: &CapitalGainsTable, holding_years: u32) -> Rate {
    cumulative_abatement(&table.social_abatement, holding_years)
}

fn surtax_bracket(brackets: &[SurtaxBracket], taxable_gain: Money) -> Option<&SurtaxBracket> {
    brackets
        .iter()
        .find(|b| taxable_gain > b.lower && b.upper.map_or(true, |upper| taxable_gain <= upper))
}

/// Surtax on a high net taxable gain (income-tax base), smoothed at the
/// entry of each bracket.
pub fn surtax(table: &CapitalGainsTable, taxable_gain: Money) -> Money {
    let Some(bracket) = surtax_bracket(&table.surtax, taxable_gain) else {
        return Decimal::ZERO;
    };
    let smoothing = match (bracket.smoothing, bracket.upper) {
        (Some(factor), Some(upper)) => (upper - taxable_gain) * factor,
        _ => Decimal::ZERO,
    };
    round_money((bracket.rate * taxable_gain - smoothing).max(Decimal::ZERO))
}

/// Tax due on resale of a rental property.
pub fn calculate_capital_gains(table: &CapitalGainsTable, input: &CapitalGainsInput) -> CapitalGainsResult {
    let purchase = input.purchase_price.max(Decimal::ZERO);
    let fees = input
        .acquisition_fees
        .unwrap_or(purchase * table.flat_acquisition_fee_rate);
    let works = input.works.unwrap_or(if input.holding_years > table.flat_works_min_years {
        purchase * table.flat_works_rate
    } else {
        Decimal::ZERO
    });
    let depreciation = if table.reintegrate_depreciation {
        input.depreciation_claimed.max(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let acquisition_cost = purchase + fees + works - depreciation;
    let gross_gain = input.sale_price - acquisition_cost;

    let ir_abatement = income_tax_abatement(table, input.holding_years);
    let ps_abatement = social_abatement(table, input.holding_years);
    let exempt = ir_abatement == Decimal::ONE && ps_abatement == Decimal::ONE;

    let positive_gain = gross_gain.max(Decimal::ZERO);
    let income_tax_base = positive_gain * (Decimal::ONE - ir_abatement);
    let social_base = positive_gain * (Decimal::ONE - ps_abatement);

    let income_tax = income_tax_base * table.income_tax_rate;
    let social_charges = social_base * table.social_rate;
    let surtax_due = surtax(table, round_money(income_tax_base));
    let total_tax = round_money(income_tax + social_charges + surtax_due);

    CapitalGainsResult {
        acquisition_fees: round_money(fees),
        works: round_money(works),
        depreciation_reintegrated: round_money(depreciation),
        acquisition_cost: round_money(acquisition_cost),
        gross_gain: round_money(gross_gain),
        income_tax_abatement: round_rate(ir_abatement),
        social_abatement: round_rate(ps_abatement),
        income_tax_base: round_money(income_tax_base),
        social_base: round_money(social_base),
        income_tax: round_money(income_tax),
        social_charges: round_money(social_charges),
        surtax: surtax_due,
        total_tax,
        effective_rate: round_rate(ratio_or_zero(total_tax, gross_gain)),
        net_proceeds: round_money(input.sale_price - total_tax),
        exempt,
        exemption_reason: exempt.then(|| {
            format!(
                "Plus-value totalement exonérée après {} ans de détention.",
                input.holding_years
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;
    use rust_decimal_macros::dec;

    fn table() -> CapitalGainsTable {
        TaxTables::default().capital_gains
    }

    fn input(sale: Money, purchase: Money, years: u32) -> CapitalGainsInput {
        CapitalGainsInput {
            sale_price: sale,
            purchase_price: purchase,
            acquisition_fees: None,
            works: None,
            holding_years: years,
            depreciation_claimed: Decimal::ZERO,
        }
    }

    #[test]
    fn test_abatement_curves() {
        let t = table();
        assert_eq!(income_tax_abatement(&t, 5), Decimal::ZERO);
        assert_eq!(income_tax_abatement(&t, 6), dec!(0.06));
        assert_eq!(income_tax_abatement(&t, 21), dec!(0.96));
        assert_eq!(income_tax_abatement(&t, 22), Decimal::ONE);
        assert_eq!(income_tax_abatement(&t, 35), Decimal::ONE);

        assert_eq!(social_abatement(&t, 10), dec!(0.0825));
        assert_eq!(social_abatement(&t, 22), dec!(0.28));
        assert_eq!(social_abatement(&t, 29), dec!(0.91));
        assert_eq!(social_abatement(&t, 30), Decimal::ONE);
    }

    #[test]
    fn test_ten_year_resale_with_flat_allowances() {
        // Cost 200,000 + 15,000 fees + 30,000 works, gain 55,000
        let r = calculate_capital_gains(&table(), &input(dec!(300_000), dec!(200_000), 10));
        assert_eq!(r.acquisition_cost, dec!(245_000));
        assert_eq!(r.gross_gain, dec!(55_000));
        assert_eq!(r.income_tax_abatement, dec!(0.30));
        assert_eq!(r.income_tax_base, dec!(38_500));
        assert_eq!(r.income_tax, dec!(7_315));
        assert_eq!(r.social_charges, dec!(8_680));
        assert_eq!(r.surtax, Decimal::ZERO);
        assert_eq!(r.total_tax, dec!(15_995));
        assert!(!r.exempt);
    }

    #[test]
    fn test_no_flat_works_under_six_years() {
        let r = calculate_capital_gains(&table(), &input(dec!(300_000), dec!(200_000), 5));
        assert_eq!(r.works, Decimal::ZERO);
        assert_eq!(r.gross_gain, dec!(85_000));
    }

    #[test]
    fn test_surtax_smoothing() {
        let t = table();
        assert_eq!(surtax(&t, dec!(50_000)), Decimal::ZERO);
        // 2% * 55,000 - 5,000 / 20
        assert_eq!(surtax(&t, dec!(55_000)), dec!(850));
        assert_eq!(surtax(&t, dec!(80_000)), dec!(1_600));
        // 5% * 209,100 - 900 * 20%
        assert_eq!(surtax(&t, dec!(209_100)), dec!(10_275));
        assert_eq!(surtax(&t, dec!(1_000_000)), dec!(60_000));
    }

    #[test]
    fn test_large_gain_pays_surtax() {
        let r = calculate_capital_gains(&table(), &input(dec!(500_000), dec!(200_000), 8));
        assert_eq!(r.gross_gain, dec!(255_000));
        assert_eq!(r.income_tax_base, dec!(209_100));
        assert_eq!(r.surtax, dec!(10_275));
        assert_eq!(r.total_tax, dec!(91_693));
    }

    #[test]
    fn test_depreciation_is_reintegrated() {
        let mut i = input(dec!(300_000), dec!(200_000), 10);
        i.depreciation_claimed = dec!(72_000);
        let r = calculate_capital_gains(&table(), &i);
        assert_eq!(r.depreciation_reintegrated, dec!(72_000));
        assert_eq!(r.gross_gain, dec!(127_000));
    }

    #[test]
    fn test_full_exemption_after_thirty_years() {
        let r = calculate_capital_gains(&table(), &input(dec!(600_000), dec!(150_000), 30));
        assert!(r.exempt);
        assert!(r.exemption_reason.is_some());
        assert_eq!(r.total_tax, Decimal::ZERO);
        assert_eq!(r.effective_rate, Decimal::ZERO);
    }

    #[test]
    fn test_loss_is_not_taxed() {
        let r = calculate_capital_gains(&table(), &input(dec!(180_000), dec!(200_000), 3));
        assert!(r.gross_gain < Decimal::ZERO);
        assert_eq!(r.total_tax, Decimal::ZERO);
        assert_eq!(r.effective_rate, Decimal::ZERO);
        assert!(!r.exempt);
    }
}
