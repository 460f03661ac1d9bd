//! Furnished-rental (LMNP) alternative, computed side by side with the
//! Jeanbrun scenario.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tables::{LmnpTable, MicroBicParameters};
use crate::types::{round_money, Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalType {
    #[default]
    LongTerm,
    ClassifiedTourism,
    UnclassifiedTourism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmnpRegime {
    MicroBic,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Jeanbrun,
    Lmnp,
    Equivalent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmnpInput {
    pub annual_rent: Money,
    /// Deductible charges excluding loan interest
    pub annual_charges: Money,
    /// Loan interest per year; missing years count as zero
    #[serde(default)]
    pub yearly_loan_interest: Vec<Money>,
    /// Price of the property including works (land included)
    pub property_price: Money,
    #[serde(default)]
    pub furniture_value: Money,
    #[serde(default)]
    pub rental_type: RentalType,
    pub marginal_rate: Rate,
    pub social_charges_rate: Rate,
    pub years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroBicResult {
    /// Receipts within the micro-BIC ceiling
    pub eligible: bool,
    pub allowance_rate: Rate,
    pub receipts_ceiling: Money,
    pub allowance: Money,
    pub taxable_income: Money,
    pub annual_tax: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDepreciation {
    pub name: String,
    pub base: Money,
    pub useful_life_years: u32,
    pub annual_depreciation: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealRegimeYear {
    pub year: u32,
    pub result_before_depreciation: Money,
    pub depreciation_available: Money,
    pub depreciation_used: Money,
    pub depreciation_carried_forward: Money,
    pub deficit_carried_forward: Money,
    pub taxable_income: Money,
    pub tax: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealRegimeResult {
    pub depreciable_base: Money,
    pub components: Vec<ComponentDepreciation>,
    pub annual_furniture_depreciation: Money,
    pub years: Vec<RealRegimeYear>,
    pub total_tax: Money,
    /// Depreciation left unused at the end of the horizon
    pub depreciation_carried_forward: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmnpResult {
    pub rental_type: RentalType,
    pub micro_bic: MicroBicResult,
    pub micro_bic_total_tax: Money,
    pub real: RealRegimeResult,
    pub best_regime: LmnpRegime,
    pub best_total_tax: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeComparison {
    pub jeanbrun_annual_saving: Money,
    pub jeanbrun_total_saving: Money,
    pub lmnp_regime: LmnpRegime,
    pub lmnp_annual_saving: Money,
    pub lmnp_total_saving: Money,
    /// Jeanbrun saving minus LMNP saving, over the horizon
    pub difference: Money,
    pub recommendation: Recommendation,
    pub justification: String,
}

// ---------------------------------------------------------------------------
// Regimes
// ---------------------------------------------------------------------------

fn micro_parameters(table: &LmnpTable, rental_type: RentalType) -> MicroBicParameters {
    match rental_type {
        RentalType::LongTerm => table.long_term,
        RentalType::ClassifiedTourism => table.classified_tourism,
        RentalType::UnclassifiedTourism => table.unclassified_tourism,
    }
}

/// Flat-rate regime: a fixed allowance replaces every actual charge.
pub fn calculate_micro_bic(table: &LmnpTable, input: &LmnpInput) -> MicroBicResult {
    let params = micro_parameters(table, input.rental_type);
    let rent = input.annual_rent.max(Decimal::ZERO);
    let allowance = (rent * params.allowance_rate).max(table.minimum_allowance).min(rent);
    let taxable_income = rent - allowance;
    let annual_tax = taxable_income * (input.marginal_rate + input.social_charges_rate);

    MicroBicResult {
        eligible: rent <= params.receipts_ceiling,
        allowance_rate: params.allowance_rate,
        receipts_ceiling: params.receipts_ceiling,
        allowance: round_money(allowance),
        taxable_income: round_money(taxable_income),
        annual_tax: round_money(annual_tax),
    }
}

/// Itemized regime. Depreciation may only bring the result down to zero; the
/// unused part is carried forward. Charges in excess of rent form an
/// ordinary deficit carried against later results.
pub fn calculate_real_regime(table: &LmnpTable, input: &LmnpInput) -> RealRegimeResult {
    let depreciable_base = input.property_price.max(Decimal::ZERO) * (Decimal::ONE - table.land_share);
    let components: Vec<ComponentDepreciation> = table
        .components
        .iter()
        .map(|c| {
            let base = depreciable_base * c.share;
            ComponentDepreciation {
                name: c.name.clone(),
                base,
                useful_life_years: c.useful_life_years,
                annual_depreciation: base / Decimal::from(c.useful_life_years.max(1)),
            }
        })
        .collect();
    let furniture = input.furniture_value.max(Decimal::ZERO) / Decimal::from(table.furniture_life_years.max(1));
    let total_rate = input.marginal_rate + input.social_charges_rate;

    let mut depreciation_carry = Decimal::ZERO;
    let mut deficit_carry = Decimal::ZERO;
    let mut total_tax = Decimal::ZERO;
    let mut years = Vec::with_capacity(input.years as usize);

    for year in 1..=input.years {
        let interest = input
            .yearly_loan_interest
            .get(year as usize - 1)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let before = input.annual_rent - input.annual_charges - interest;

        let result_after_deficit = if before < Decimal::ZERO {
            deficit_carry += before.abs();
            Decimal::ZERO
        } else {
            let absorbed = before.min(deficit_carry);
            deficit_carry -= absorbed;
            before - absorbed
        };

        let mut depreciation_year: Money = components
            .iter()
            .filter(|c| year <= c.useful_life_years)
            .map(|c| c.annual_depreciation)
            .sum();
        if year <= table.furniture_life_years {
            depreciation_year += furniture;
        }

        let available = depreciation_year + depreciation_carry;
        let used = available.min(result_after_deficit);
        depreciation_carry = available - used;
        let taxable = result_after_deficit - used;
        let tax = round_money(taxable * total_rate);
        total_tax += tax;

        years.push(RealRegimeYear {
            year,
            result_before_depreciation: round_money(before),
            depreciation_available: round_money(available),
            depreciation_used: round_money(used),
            depreciation_carried_forward: round_money(depreciation_carry),
            deficit_carried_forward: round_money(deficit_carry),
            taxable_income: round_money(taxable),
            tax,
        });
    }

    RealRegimeResult {
        depreciable_base: round_money(depreciable_base),
        components: components
            .into_iter()
            .map(|c| ComponentDepreciation {
                base: round_money(c.base),
                annual_depreciation: round_money(c.annual_depreciation),
                ..c
            })
            .collect(),
        annual_furniture_depreciation: round_money(furniture),
        years,
        total_tax,
        depreciation_carried_forward: round_money(depreciation_carry),
    }
}

/// Both regimes, and the cheaper one among those the receipts allow.
pub fn calculate_lmnp(table: &LmnpTable, input: &LmnpInput) -> LmnpResult {
    let micro_bic = calculate_micro_bic(table, input);
    let micro_bic_total_tax = micro_bic.annual_tax * Decimal::from(input.years);
    let real = calculate_real_regime(table, input);

    let (best_regime, best_total_tax) = if micro_bic.eligible && micro_bic_total_tax < real.total_tax {
        (LmnpRegime::MicroBic, micro_bic_total_tax)
    } else {
        (LmnpRegime::Real, real.total_tax)
    };

    LmnpResult {
        rental_type: input.rental_type,
        micro_bic,
        micro_bic_total_tax,
        real,
        best_regime,
        best_total_tax,
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn regime_label(regime: LmnpRegime) -> &'static str {
    match regime {
        LmnpRegime::MicroBic => "LMNP micro-BIC",
        LmnpRegime::Real => "LMNP au réel",
    }
}

/// Compare the Jeanbrun saving with the best LMNP regime. Both savings are
/// measured against the same baseline: unfurnished rental taxed without
/// Jeanbrun amortization.
pub fn compare_with_jeanbrun(
    table: &LmnpTable,
    lmnp: &LmnpResult,
    baseline_total_tax: Money,
    jeanbrun_total_saving: Money,
    years: u32,
) -> RegimeComparison {
    let per_year = |total: Money| {
        if years == 0 {
            Decimal::ZERO
        } else {
            round_money(total / Decimal::from(years))
        }
    };

    let lmnp_total_saving = round_money(baseline_total_tax - lmnp.best_total_tax);
    let difference = jeanbrun_total_saving - lmnp_total_saving;
    let margin = jeanbrun_total_saving.abs().max(lmnp_total_saving.abs()) * table.equivalence_margin;

    let recommendation = if difference.abs() <= margin {
        Recommendation::Equivalent
    } else if difference > Decimal::ZERO {
        Recommendation::Jeanbrun
    } else {
        Recommendation::Lmnp
    };

    let label = regime_label(lmnp.best_regime);
    let justification = match recommendation {
        Recommendation::Equivalent => format!(
            "Sur {years} ans, le dispositif Jeanbrun ({jeanbrun_total_saving} €) et le régime {label} \
             ({lmnp_total_saving} €) procurent une économie d'impôt comparable."
        ),
        Recommendation::Jeanbrun => format!(
            "Sur {years} ans, le dispositif Jeanbrun fait économiser {jeanbrun_total_saving} € contre \
             {lmnp_total_saving} € en {label}, soit {} € de plus.",
            difference.abs()
        ),
        Recommendation::Lmnp => format!(
            "Sur {years} ans, le régime {label} fait économiser {lmnp_total_saving} € contre \
             {jeanbrun_total_saving} € avec le dispositif Jeanbrun, soit {} € de plus.",
            difference.abs()
        ),
    };

    RegimeComparison {
        jeanbrun_annual_saving: per_year(jeanbrun_total_saving),
        jeanbrun_total_saving,
        lmnp_regime: lmnp.best_regime,
        lmnp_annual_saving: per_year(lmnp_total_saving),
        lmnp_total_saving,
        difference,
        recommendation,
        justification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;
    use rust_decimal_macros::dec;

    fn table() -> LmnpTable {
        TaxTables::default().lmnp
    }

    fn input() -> LmnpInput {
        LmnpInput {
            annual_rent: dec!(12_000),
            annual_charges: dec!(2_000),
            yearly_loan_interest: vec![dec!(5_000); 9],
            property_price: dec!(200_000),
            furniture_value: dec!(7_000),
            rental_type: RentalType::LongTerm,
            marginal_rate: dec!(0.30),
            social_charges_rate: dec!(0.172),
            years: 9,
        }
    }

    #[test]
    fn test_micro_bic_long_term() {
        let r = calculate_micro_bic(&table(), &input());
        assert!(r.eligible);
        assert_eq!(r.allowance, dec!(6_000));
        assert_eq!(r.taxable_income, dec!(6_000));
        // 6,000 * 47.2%
        assert_eq!(r.annual_tax, dec!(2_832));
    }

    #[test]
    fn test_micro_bic_unclassified_tourism_ceiling() {
        let mut i = input();
        i.rental_type = RentalType::UnclassifiedTourism;
        i.annual_rent = dec!(20_000);
        let r = calculate_micro_bic(&table(), &i);
        assert!(!r.eligible);
        assert_eq!(r.allowance, dec!(6_000));
    }

    #[test]
    fn test_micro_bic_minimum_allowance() {
        let mut i = input();
        i.annual_rent = dec!(400);
        let r = calculate_micro_bic(&table(), &i);
        assert_eq!(r.allowance, dec!(305));
        assert_eq!(r.taxable_income, dec!(95));
    }

    #[test]
    fn test_real_regime_depreciation_wipes_out_result() {
        // Base 170,000: 1,360 + 1,360 + 2,266.67 + 3,400 = 8,386.67 per year
        // plus 1,000 furniture; result before depreciation 5,000
        let r = calculate_real_regime(&table(), &input());
        assert_eq!(r.depreciable_base, dec!(170_000));
        assert_eq!(r.annual_furniture_depreciation, dec!(1_000));
        assert_eq!(r.total_tax, Decimal::ZERO);
        let first = &r.years[0];
        assert_eq!(first.depreciation_used, dec!(5_000));
        assert_eq!(first.taxable_income, Decimal::ZERO);
        assert!(r.depreciation_carried_forward > Decimal::ZERO);
    }

    #[test]
    fn test_real_regime_ordinary_deficit_carried() {
        let mut i = input();
        i.yearly_loan_interest = vec![dec!(15_000), dec!(0)];
        i.property_price = Decimal::ZERO;
        i.furniture_value = Decimal::ZERO;
        i.years = 2;
        let r = calculate_real_regime(&table(), &i);
        // Year 1: 12,000 - 2,000 - 15,000 = -5,000 carried
        assert_eq!(r.years[0].deficit_carried_forward, dec!(5_000));
        // Year 2: 10,000 - 5,000 = 5,000 taxable
        assert_eq!(r.years[1].taxable_income, dec!(5_000));
        assert_eq!(r.years[1].deficit_carried_forward, Decimal::ZERO);
    }

    #[test]
    fn test_best_regime_is_real_when_depreciation_covers_income() {
        let r = calculate_lmnp(&table(), &input());
        assert_eq!(r.best_regime, LmnpRegime::Real);
        assert_eq!(r.micro_bic_total_tax, dec!(25_488));
    }

    #[test]
    fn test_comparison_recommendations() {
        let lmnp = calculate_lmnp(&table(), &input());
        // Baseline 20,000 of tax, LMNP pays 0 -> saves 20,000
        let jeanbrun_wins = compare_with_jeanbrun(&table(), &lmnp, dec!(20_000), dec!(30_000), 9);
        assert_eq!(jeanbrun_wins.recommendation, Recommendation::Jeanbrun);
        assert_eq!(jeanbrun_wins.difference, dec!(10_000));

        let lmnp_wins = compare_with_jeanbrun(&table(), &lmnp, dec!(20_000), dec!(10_000), 9);
        assert_eq!(lmnp_wins.recommendation, Recommendation::Lmnp);

        let tie = compare_with_jeanbrun(&table(), &lmnp, dec!(20_000), dec!(19_500), 9);
        assert_eq!(tie.recommendation, Recommendation::Equivalent);
        assert_eq!(tie.lmnp_annual_saving, dec!(2_222));
    }
}
