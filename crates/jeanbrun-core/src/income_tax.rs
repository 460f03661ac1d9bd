use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::tables::{BracketTable, IncomeTaxTable};
use crate::types::{ratio_or_zero, round_money, round_rate, Money, Parts, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Household filing situation. Sets the baseline parts (1 or 2) used for the
/// quotient-familial cap and the décote thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalSituation {
    #[default]
    Single,
    Couple,
}

impl FiscalSituation {
    pub fn baseline_parts(self) -> Parts {
        match self {
            FiscalSituation::Single => Decimal::ONE,
            FiscalSituation::Couple => dec!(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeTaxInput {
    /// Net taxable household income (revenu net imposable)
    pub taxable_income: Money,
    /// Number of fiscal parts
    pub parts: Parts,
    #[serde(default)]
    pub situation: FiscalSituation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxResult {
    pub quotient_familial: Money,
    pub marginal_rate: Rate,
    pub tax_per_part: Money,
    /// Gross tax before the quotient-familial cap
    pub gross_tax_before_cap: Money,
    /// Gross tax after the quotient-familial cap
    pub gross_tax: Money,
    pub qf_cap_applied: bool,
    pub decote: Money,
    pub net_tax: Money,
    pub average_rate: Rate,
}

/// Bracket the quotient familial falls in, and how much taxable income the
/// household can add before crossing into the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginalBracket {
    pub index: usize,
    pub marginal_rate: Rate,
    pub lower: Money,
    pub upper: Option<Money>,
    /// `None` in the top bracket
    pub headroom: Option<Money>,
}

// ---------------------------------------------------------------------------
// Progressive tax
// ---------------------------------------------------------------------------

/// Unrounded progressive tax on `income`.
fn progressive_tax(brackets: &BracketTable, income: Money) -> Money {
    if income <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut tax = Decimal::ZERO;
    for bracket in brackets.brackets() {
        if income <= bracket.lower {
            break;
        }
        let top = bracket.upper.map_or(income, |upper| income.min(upper));
        tax += (top - bracket.lower) * bracket.rate;
        if bracket.upper.map_or(true, |upper| income <= upper) {
            break;
        }
    }
    tax
}

/// Progressive bracket tax on `income`, rounded to the euro.
pub fn gross_tax(brackets: &BracketTable, income: Money) -> Money {
    round_money(progressive_tax(brackets, income))
}

fn quotient(income: Money, parts: Parts) -> Money {
    if income <= Decimal::ZERO || parts <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        income / parts
    }
}

/// Tax rate applied to the last euro of the quotient familial (TMI).
pub fn marginal_rate(brackets: &BracketTable, income: Money, parts: Parts) -> Rate {
    let qf = quotient(income, parts);
    brackets
        .locate(qf)
        .map_or_else(|| brackets.top_rate(), |(_, b)| b.rate)
}

/// Marginal bracket with headroom, expressed in household income
/// (`(upper - qf) * parts`).
pub fn marginal_bracket(brackets: &BracketTable, income: Money, parts: Parts) -> MarginalBracket {
    let qf = quotient(income, parts);
    match brackets.locate(qf) {
        Some((index, b)) => MarginalBracket {
            index,
            marginal_rate: b.rate,
            lower: b.lower,
            upper: b.upper,
            headroom: b
                .upper
                .map(|upper| round_money((upper - qf) * parts.max(Decimal::ZERO))),
        },
        None => MarginalBracket {
            index: 0,
            marginal_rate: Decimal::ZERO,
            lower: Decimal::ZERO,
            upper: None,
            headroom: None,
        },
    }
}

/// Tax saved by deducting `deduction` from taxable income at `marginal_rate`.
pub fn tax_saving_from_deduction(deduction: Money, marginal_rate: Rate) -> Money {
    round_money(deduction.max(Decimal::ZERO) * marginal_rate)
}

// ---------------------------------------------------------------------------
// Full computation
// ---------------------------------------------------------------------------

/// Income tax with quotient familial, its cap, and the décote.
pub fn calculate_income_tax(table: &IncomeTaxTable, input: &IncomeTaxInput) -> IncomeTaxResult {
    let income = input.taxable_income;
    let parts = input.parts;
    let qf = quotient(income, parts);
    let rate = marginal_rate(&table.brackets, income, parts);

    let tax_per_part = progressive_tax(&table.brackets, qf);
    let unadjusted = tax_per_part * parts.max(Decimal::ZERO);

    // Quotient-familial cap
    let baseline_parts = input.situation.baseline_parts();
    let mut gross = unadjusted;
    let mut qf_cap_applied = false;
    if parts > baseline_parts {
        let baseline_tax =
            progressive_tax(&table.brackets, quotient(income, baseline_parts)) * baseline_parts;
        let advantage = baseline_tax - unadjusted;
        let extra_half_shares = (parts - baseline_parts) * dec!(2);
        let cap = table.qf_cap_per_half_share * extra_half_shares;
        if advantage > cap {
            gross = baseline_tax - cap;
            qf_cap_applied = true;
        }
    }

    // Décote
    let decote_table = &table.decote;
    let (base, threshold) = match input.situation {
        FiscalSituation::Single => (decote_table.single_base, decote_table.single_threshold),
        FiscalSituation::Couple => (decote_table.couple_base, decote_table.couple_threshold),
    };
    let decote = if gross > Decimal::ZERO && gross < threshold {
        (base - gross * decote_table.factor).max(Decimal::ZERO).min(gross)
    } else {
        Decimal::ZERO
    };

    let net_tax = round_money((gross - decote).max(Decimal::ZERO));

    IncomeTaxResult {
        quotient_familial: round_money(qf),
        marginal_rate: rate,
        tax_per_part: round_money(tax_per_part),
        gross_tax_before_cap: round_money(unadjusted),
        gross_tax: round_money(gross),
        qf_cap_applied,
        decote: round_money(decote),
        net_tax,
        average_rate: round_rate(ratio_or_zero(net_tax, income)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;

    fn table() -> IncomeTaxTable {
        TaxTables::default().income_tax
    }

    fn input(taxable_income: Money, parts: Parts, situation: FiscalSituation) -> IncomeTaxInput {
        IncomeTaxInput {
            taxable_income,
            parts,
            situation,
        }
    }

    #[test]
    fn test_gross_tax_below_first_bracket_is_zero() {
        let t = table();
        assert_eq!(gross_tax(&t.brackets, dec!(11_000)), Decimal::ZERO);
        assert_eq!(gross_tax(&t.brackets, dec!(0)), Decimal::ZERO);
        assert_eq!(gross_tax(&t.brackets, dec!(-3_000)), Decimal::ZERO);
    }

    #[test]
    fn test_gross_tax_single_50k() {
        // (29,315 - 11,497) * 11% + (50,000 - 29,315) * 30%
        // = 1,959.98 + 6,205.50 = 8,165.48
        // The approximate 8,153 quoted for this case is 12 below what the
        // baseline brackets give.
        let t = table();
        assert_eq!(gross_tax(&t.brackets, dec!(50_000)), dec!(8_165));
    }

    #[test]
    fn test_marginal_rate_single_50k() {
        let t = table();
        assert_eq!(marginal_rate(&t.brackets, dec!(50_000), dec!(1)), dec!(0.30));
    }

    #[test]
    fn test_marginal_rate_degenerate_inputs() {
        let t = table();
        assert_eq!(marginal_rate(&t.brackets, dec!(0), dec!(1)), Decimal::ZERO);
        assert_eq!(marginal_rate(&t.brackets, dec!(50_000), dec!(0)), Decimal::ZERO);
        assert_eq!(marginal_rate(&t.brackets, dec!(5_000_000), dec!(1)), dec!(0.45));
    }

    #[test]
    fn test_marginal_bracket_headroom() {
        let t = table();
        let b = marginal_bracket(&t.brackets, dec!(60_000), dec!(2));
        // QF = 30,000 -> 30% bracket, 53,823 left per part
        assert_eq!(b.index, 2);
        assert_eq!(b.marginal_rate, dec!(0.30));
        assert_eq!(b.headroom, Some(dec!(107_646)));

        let top = marginal_bracket(&t.brackets, dec!(400_000), dec!(1));
        assert_eq!(top.headroom, None);
    }

    #[test]
    fn test_full_tax_single_50k() {
        let r = calculate_income_tax(&table(), &input(dec!(50_000), dec!(1), FiscalSituation::Single));
        assert_eq!(r.quotient_familial, dec!(50_000));
        assert_eq!(r.marginal_rate, dec!(0.30));
        assert_eq!(r.gross_tax, dec!(8_165));
        assert!(!r.qf_cap_applied);
        assert_eq!(r.decote, Decimal::ZERO);
        assert_eq!(r.net_tax, dec!(8_165));
        assert_eq!(r.average_rate, dec!(0.1633));
    }

    #[test]
    fn test_qf_cap_applies_for_high_income_family() {
        // Couple with two children (3 parts), 150k
        let r = calculate_income_tax(&table(), &input(dec!(150_000), dec!(3), FiscalSituation::Couple));
        assert!(r.qf_cap_applied);
        // Baseline (2 parts): QF 75,000 -> per part 1,959.98 + 13,705.50 = 15,665.48
        // baseline tax 31,330.96, cap 2 * 1,791 = 3,582 -> 27,748.96
        assert_eq!(r.gross_tax, dec!(27_749));
        assert!(r.gross_tax > r.gross_tax_before_cap);
    }

    #[test]
    fn test_qf_cap_not_applied_when_advantage_small() {
        // 1.5 parts, single parent, modest income
        let r = calculate_income_tax(&table(), &input(dec!(30_000), dec!(1.5), FiscalSituation::Single));
        assert!(!r.qf_cap_applied);
        assert_eq!(r.gross_tax, r.gross_tax_before_cap);
    }

    #[test]
    fn test_decote_reduces_small_tax() {
        // Single, 20,000: (20,000 - 11,497) * 11% = 935.33
        // décote = 889 - 935.33 * 0.4525 = 465.76
        let r = calculate_income_tax(&table(), &input(dec!(20_000), dec!(1), FiscalSituation::Single));
        assert_eq!(r.gross_tax, dec!(935));
        assert_eq!(r.decote, dec!(466));
        assert_eq!(r.net_tax, dec!(470));
    }

    #[test]
    fn test_decote_clamped_to_gross_tax() {
        // Tax of 110 -> 889 - 49.8 = 839 > 110, clamped
        let r = calculate_income_tax(&table(), &input(dec!(12_497), dec!(1), FiscalSituation::Single));
        assert_eq!(r.gross_tax, dec!(110));
        assert_eq!(r.decote, dec!(110));
        assert_eq!(r.net_tax, Decimal::ZERO);
    }

    #[test]
    fn test_zero_income_yields_zero_result() {
        let r = calculate_income_tax(&table(), &input(dec!(0), dec!(2), FiscalSituation::Couple));
        assert_eq!(r.net_tax, Decimal::ZERO);
        assert_eq!(r.average_rate, Decimal::ZERO);
        assert_eq!(r.marginal_rate, Decimal::ZERO);
    }

    #[test]
    fn test_tax_saving_from_deduction() {
        assert_eq!(tax_saving_from_deduction(dec!(10_000), dec!(0.30)), dec!(3_000));
        assert_eq!(tax_saving_from_deduction(dec!(-10_000), dec!(0.30)), Decimal::ZERO);
    }
}
