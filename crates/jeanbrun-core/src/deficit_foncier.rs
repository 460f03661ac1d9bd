use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tables::DeficitFoncierTable;
use crate::types::{round_money, Money};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeficitFoncierInput {
    /// Gross annual rent
    pub rent: Money,
    /// Deductible charges other than loan interest (amortization included)
    pub deductible_charges: Money,
    pub loan_interest: Money,
    /// Energy-renovation works qualifying for the bonified cap
    #[serde(default)]
    pub energy_works: bool,
    pub evaluation_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitFoncierResult {
    /// Net property income, zero when in deficit
    pub net_property_income: Money,
    pub total_deficit: Money,
    /// Deficit coming from charges other than interest
    pub non_interest_deficit: Money,
    /// Interest rent could not absorb; carried forward only
    pub unabsorbed_interest: Money,
    pub applicable_cap: Money,
    pub bonified_cap_applied: bool,
    /// Amount deducted from the household's general income
    pub deductible_from_income: Money,
    pub carried_forward: Money,
    pub carry_forward_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryForwardRow {
    /// 1-based year after the deficit arose
    pub year: u32,
    pub carried_in: Money,
    pub property_income: Money,
    pub absorbed: Money,
    pub remaining: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryForwardLedger {
    pub initial_deficit: Money,
    pub rows: Vec<CarryForwardRow>,
    pub total_absorbed: Money,
    /// Unused balance at the end of the ledger (lost once the carry-forward
    /// window has elapsed)
    pub final_balance: Money,
}

// ---------------------------------------------------------------------------
// Yearly split
// ---------------------------------------------------------------------------

/// Annual cap on the deduction against general income.
pub fn applicable_cap(table: &DeficitFoncierTable, energy_works: bool, evaluation_date: NaiveDate) -> Money {
    if energy_works && evaluation_date <= table.bonified_until {
        table.bonified_cap
    } else {
        table.standard_cap
    }
}

/// Split a property-income result into the part deductible from general
/// income and the part carried forward.
///
/// Interest can only be carried forward. Charges other than interest are
/// deductible up to the annual cap, the excess joining the carry-forward.
pub fn calculate_deficit_foncier(table: &DeficitFoncierTable, input: &DeficitFoncierInput) -> DeficitFoncierResult {
    let cap = applicable_cap(table, input.energy_works, input.evaluation_date);
    let bonified_cap_applied = cap != table.standard_cap;
    let net_result = input.rent - input.deductible_charges - input.loan_interest;

    if net_result >= Decimal::ZERO {
        return DeficitFoncierResult {
            net_property_income: round_money(net_result),
            total_deficit: Decimal::ZERO,
            non_interest_deficit: Decimal::ZERO,
            unabsorbed_interest: Decimal::ZERO,
            applicable_cap: cap,
            bonified_cap_applied,
            deductible_from_income: Decimal::ZERO,
            carried_forward: Decimal::ZERO,
            carry_forward_years: table.carry_forward_years,
        };
    }

    let total_deficit = net_result.abs();
    let non_interest_result = input.rent - input.deductible_charges;

    let (non_interest_deficit, unabsorbed_interest) = if non_interest_result >= Decimal::ZERO {
        (
            Decimal::ZERO,
            (input.loan_interest - non_interest_result).max(Decimal::ZERO),
        )
    } else {
        // Rent had nothing left to absorb interest
        (non_interest_result.abs(), input.loan_interest.max(Decimal::ZERO))
    };

    let deductible = non_interest_deficit.min(cap);
    let carried = (non_interest_deficit - cap).max(Decimal::ZERO) + unabsorbed_interest;

    DeficitFoncierResult {
        net_property_income: Decimal::ZERO,
        total_deficit: round_money(total_deficit),
        non_interest_deficit: round_money(non_interest_deficit),
        unabsorbed_interest: round_money(unabsorbed_interest),
        applicable_cap: cap,
        bonified_cap_applied,
        deductible_from_income: round_money(deductible),
        carried_forward: round_money(carried),
        carry_forward_years: table.carry_forward_years,
    }
}

// ---------------------------------------------------------------------------
// Carry-forward
// ---------------------------------------------------------------------------

/// Absorb a carried-forward deficit against future property income, one row
/// per year, for at most the carry-forward window.
pub fn carry_forward_ledger(
    table: &DeficitFoncierTable,
    initial_deficit: Money,
    future_incomes: &[Money],
) -> CarryForwardLedger {
    let mut remaining = initial_deficit.max(Decimal::ZERO);
    let mut rows = Vec::new();
    let mut total_absorbed = Decimal::ZERO;

    for (i, income) in future_incomes
        .iter()
        .take(table.carry_forward_years as usize)
        .enumerate()
    {
        let carried_in = remaining;
        let absorbed = if *income > Decimal::ZERO {
            (*income).min(remaining)
        } else {
            Decimal::ZERO
        };
        remaining -= absorbed;
        total_absorbed += absorbed;

        rows.push(CarryForwardRow {
            year: i as u32 + 1,
            carried_in,
            property_income: *income,
            absorbed,
            remaining,
        });
    }

    CarryForwardLedger {
        initial_deficit: initial_deficit.max(Decimal::ZERO),
        rows,
        total_absorbed,
        final_balance: remaining,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Vintage {
    origin_year: u32,
    remaining: Money,
}

/// Carried-forward deficits of several years, consumed oldest first. A
/// deficit from year `y` can absorb income of years `y + 1` to
/// `y + lifetime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitPool {
    lifetime: u32,
    vintages: Vec<Vintage>,
}

impl DeficitPool {
    pub fn new(lifetime: u32) -> Self {
        DeficitPool {
            lifetime,
            vintages: Vec::new(),
        }
    }

    pub fn add(&mut self, origin_year: u32, amount: Money) {
        if amount > Decimal::ZERO {
            self.vintages.push(Vintage {
                origin_year,
                remaining: amount,
            });
        }
    }

    /// Drop vintages that can no longer be used in `year`, returning the
    /// amount lost.
    pub fn expire(&mut self, year: u32) -> Money {
        let lifetime = self.lifetime;
        let lost = self
            .vintages
            .iter()
            .filter(|v| v.origin_year + lifetime < year)
            .map(|v| v.remaining)
            .sum();
        self.vintages.retain(|v| v.origin_year + lifetime >= year);
        lost
    }

    /// Absorb `income` earned in `year`, returning the amount absorbed.
    pub fn absorb(&mut self, year: u32, income: Money) -> Money {
        self.expire(year);
        let mut left = income.max(Decimal::ZERO);
        let mut absorbed = Decimal::ZERO;
        for vintage in self.vintages.iter_mut().filter(|v| v.origin_year < year) {
            if left.is_zero() {
                break;
            }
            let take = vintage.remaining.min(left);
            vintage.remaining -= take;
            left -= take;
            absorbed += take;
        }
        self.vintages.retain(|v| v.remaining > Decimal::ZERO);
        absorbed
    }

    pub fn balance(&self) -> Money {
        self.vintages.iter().map(|v| v.remaining).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::TaxTables;
    use rust_decimal_macros::dec;

    fn table() -> DeficitFoncierTable {
        TaxTables::default().deficit_foncier
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(rent: Money, charges: Money, interest: Money) -> DeficitFoncierInput {
        DeficitFoncierInput {
            rent,
            deductible_charges: charges,
            loan_interest: interest,
            energy_works: false,
            evaluation_date: date(2026, 12, 31),
        }
    }

    #[test]
    fn test_positive_result_has_no_deficit() {
        let r = calculate_deficit_foncier(&table(), &input(dec!(12_000), dec!(3_000), dec!(4_000)));
        assert_eq!(r.net_property_income, dec!(5_000));
        assert_eq!(r.total_deficit, Decimal::ZERO);
        assert_eq!(r.carried_forward, Decimal::ZERO);
        assert_eq!(r.deductible_from_income, Decimal::ZERO);
    }

    #[test]
    fn test_charges_exceed_rent_all_interest_carried() {
        let r = calculate_deficit_foncier(&table(), &input(dec!(10_000), dec!(15_000), dec!(5_000)));
        assert_eq!(r.total_deficit, dec!(10_000));
        assert_eq!(r.non_interest_deficit, dec!(5_000));
        assert_eq!(r.unabsorbed_interest, dec!(5_000));
        assert_eq!(r.deductible_from_income, dec!(5_000));
        assert_eq!(r.carried_forward, dec!(5_000));
    }

    #[test]
    fn test_interest_only_deficit_is_carried_forward() {
        // Rent covers charges (6,000 left) but not the 8,000 of interest
        let r = calculate_deficit_foncier(&table(), &input(dec!(10_000), dec!(4_000), dec!(8_000)));
        assert_eq!(r.total_deficit, dec!(2_000));
        assert_eq!(r.non_interest_deficit, Decimal::ZERO);
        assert_eq!(r.unabsorbed_interest, dec!(2_000));
        assert_eq!(r.deductible_from_income, Decimal::ZERO);
        assert_eq!(r.carried_forward, dec!(2_000));
    }

    #[test]
    fn test_standard_cap_excess_is_carried() {
        let r = calculate_deficit_foncier(&table(), &input(dec!(0), dec!(30_000), dec!(0)));
        assert_eq!(r.applicable_cap, dec!(10_700));
        assert_eq!(r.deductible_from_income, dec!(10_700));
        assert_eq!(r.carried_forward, dec!(19_300));
    }

    #[test]
    fn test_energy_works_double_the_cap_until_2027() {
        let mut i = input(dec!(0), dec!(30_000), dec!(0));
        i.energy_works = true;
        let r = calculate_deficit_foncier(&table(), &i);
        assert!(r.bonified_cap_applied);
        assert_eq!(r.deductible_from_income, dec!(21_400));
        assert_eq!(r.carried_forward, dec!(8_600));

        i.evaluation_date = date(2027, 12, 31);
        assert_eq!(calculate_deficit_foncier(&table(), &i).applicable_cap, dec!(21_400));

        i.evaluation_date = date(2028, 1, 1);
        let later = calculate_deficit_foncier(&table(), &i);
        assert!(!later.bonified_cap_applied);
        assert_eq!(later.applicable_cap, dec!(10_700));
    }

    #[test]
    fn test_ledger_absorbs_positive_years_only() {
        let incomes = vec![dec!(-1_000), dec!(3_000), dec!(0), dec!(4_000), dec!(10_000)];
        let ledger = carry_forward_ledger(&table(), dec!(9_000), &incomes);
        let absorbed: Vec<Money> = ledger.rows.iter().map(|r| r.absorbed).collect();
        assert_eq!(absorbed, vec![dec!(0), dec!(3_000), dec!(0), dec!(4_000), dec!(2_000)]);
        assert_eq!(ledger.final_balance, Decimal::ZERO);
        assert_eq!(ledger.total_absorbed + ledger.final_balance, ledger.initial_deficit);
    }

    #[test]
    fn test_ledger_stops_after_ten_years() {
        let incomes = vec![dec!(100); 15];
        let ledger = carry_forward_ledger(&table(), dec!(5_000), &incomes);
        assert_eq!(ledger.rows.len(), 10);
        assert_eq!(ledger.total_absorbed, dec!(1_000));
        assert_eq!(ledger.final_balance, dec!(4_000));
    }

    #[test]
    fn test_ledger_stops_when_incomes_end() {
        let ledger = carry_forward_ledger(&table(), dec!(5_000), &[dec!(1_000), dec!(1_000)]);
        assert_eq!(ledger.rows.len(), 2);
        assert_eq!(ledger.final_balance, dec!(3_000));
    }

    #[test]
    fn test_pool_consumes_oldest_vintage_first() {
        let mut pool = DeficitPool::new(10);
        pool.add(1, dec!(1_000));
        pool.add(2, dec!(2_000));
        assert_eq!(pool.absorb(3, dec!(1_500)), dec!(1_500));
        assert_eq!(pool.balance(), dec!(1_500));
    }

    #[test]
    fn test_pool_ignores_same_year_vintage() {
        let mut pool = DeficitPool::new(10);
        pool.add(4, dec!(1_000));
        assert_eq!(pool.absorb(4, dec!(500)), Decimal::ZERO);
        assert_eq!(pool.absorb(5, dec!(500)), dec!(500));
    }

    #[test]
    fn test_pool_expires_after_lifetime() {
        let mut pool = DeficitPool::new(10);
        pool.add(1, dec!(1_000));
        assert_eq!(pool.absorb(11, dec!(100)), dec!(100));
        assert_eq!(pool.expire(12), dec!(900));
        assert_eq!(pool.balance(), Decimal::ZERO);
    }
}
