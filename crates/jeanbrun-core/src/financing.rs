use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::tables::FinancingTable;
use crate::time_value;
use crate::types::{round_cents, round_money, round_rate, Money, Rate};

/// Newton-Raphson corrections applied to the effective-rate estimate.
const EFFECTIVE_RATE_REFINEMENTS: u32 = 3;

/// Highest nominal annual rate accepted at the input boundaries.
pub const MAX_ANNUAL_RATE: Rate = dec!(1);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanInput {
    pub principal: Money,
    /// Nominal annual rate
    pub annual_rate: Rate,
    pub duration_months: u32,
    /// Annual insurance rate applied to the initial principal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_insurance_rate: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub month: u32,
    /// Payment excluding insurance
    pub payment: Money,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    pub remaining_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanResult {
    pub principal: Money,
    pub duration_months: u32,
    pub monthly_payment: Money,
    pub monthly_insurance: Money,
    pub monthly_payment_with_insurance: Money,
    pub total_interest: Money,
    pub total_insurance: Money,
    /// Interest plus insurance
    pub total_cost: Money,
    /// Actuarial annual rate including insurance
    pub effective_annual_rate: Rate,
    pub schedule: Vec<AmortizationRow>,
}

/// Schedule rows totalled per loan year (months 1-12 are year 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanYear {
    pub year: u32,
    pub payments: Money,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    pub closing_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowingCapacityInput {
    pub monthly_income: Money,
    #[serde(default)]
    pub existing_monthly_charges: Money,
    pub annual_rate: Rate,
    pub duration_months: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_insurance_rate: Option<Rate>,
    /// Overrides the regulatory ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_debt_ratio: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowingCapacityResult {
    pub debt_ratio_used: Rate,
    /// Payment (insurance included) the household can take on
    pub max_monthly_payment: Money,
    pub capacity: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtRatioInput {
    pub monthly_income: Money,
    #[serde(default)]
    pub existing_monthly_charges: Money,
    pub new_monthly_payment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtRatioResult {
    pub total_charges: Money,
    pub debt_ratio: Rate,
    /// Below the regulatory ceiling
    pub acceptable: bool,
    /// Below the comfort ceiling
    pub recommended: bool,
    pub residual_income: Money,
    pub max_debt_ratio: Rate,
    pub comfortable_debt_ratio: Rate,
}

// ---------------------------------------------------------------------------
// Amortization
// ---------------------------------------------------------------------------

/// Monthly annuity excluding insurance, to the cent.
pub fn monthly_payment(principal: Money, annual_rate: Rate, duration_months: u32) -> Money {
    if principal <= Decimal::ZERO || duration_months == 0 {
        return Decimal::ZERO;
    }
    round_cents(time_value::pmt(annual_rate / dec!(12), duration_months, principal))
}

/// Monthly insurance premium on the initial principal, to the cent.
pub fn monthly_insurance(principal: Money, annual_insurance_rate: Option<Rate>) -> Money {
    match annual_insurance_rate {
        Some(rate) if principal > Decimal::ZERO => round_cents(principal * rate / dec!(12)),
        _ => Decimal::ZERO,
    }
}

/// Payment, totals, effective rate and the month-by-month schedule.
///
/// The last row repays the exact remaining balance so the principal column
/// sums to the amount borrowed.
pub fn calculate_loan(input: &LoanInput) -> LoanResult {
    let months = input.duration_months;
    let principal = input.principal.max(Decimal::ZERO);
    let monthly_rate = input.annual_rate / dec!(12);
    let payment = monthly_payment(principal, input.annual_rate, months);
    let insurance = monthly_insurance(principal, input.annual_insurance_rate);

    let mut schedule = Vec::with_capacity(months as usize);
    let mut balance = principal;
    let mut total_interest = Decimal::ZERO;
    let mut total_insurance = Decimal::ZERO;

    if principal > Decimal::ZERO {
        for month in 1..=months {
            let interest = round_cents(balance * monthly_rate);
            let (row_payment, row_principal) = if month == months {
                (balance + interest, balance)
            } else {
                let repaid = (payment - interest).min(balance).max(Decimal::ZERO);
                (payment, repaid)
            };
            balance -= row_principal;
            total_interest += interest;
            total_insurance += insurance;

            schedule.push(AmortizationRow {
                month,
                payment: row_payment,
                principal: row_principal,
                interest,
                insurance,
                remaining_balance: balance,
            });
        }
    }

    let monthly_rate_with_insurance =
        time_value::implied_rate(principal, payment + insurance, months, EFFECTIVE_RATE_REFINEMENTS);
    let effective_annual_rate = (Decimal::ONE + monthly_rate_with_insurance)
        .checked_powu(12)
        .map_or(Decimal::ZERO, |growth| growth - Decimal::ONE);

    LoanResult {
        principal,
        duration_months: months,
        monthly_payment: payment,
        monthly_insurance: insurance,
        monthly_payment_with_insurance: payment + insurance,
        total_interest: round_money(total_interest),
        total_insurance: round_money(total_insurance),
        total_cost: round_money(total_interest + total_insurance),
        effective_annual_rate: round_rate(effective_annual_rate),
        schedule,
    }
}

/// Group schedule rows into loan years.
pub fn annual_breakdown(schedule: &[AmortizationRow]) -> Vec<LoanYear> {
    schedule
        .chunks(12)
        .enumerate()
        .map(|(i, rows)| LoanYear {
            year: i as u32 + 1,
            payments: rows.iter().map(|r| r.payment + r.insurance).sum(),
            principal: rows.iter().map(|r| r.principal).sum(),
            interest: rows.iter().map(|r| r.interest).sum(),
            insurance: rows.iter().map(|r| r.insurance).sum(),
            closing_balance: rows.last().map_or(Decimal::ZERO, |r| r.remaining_balance),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Capacity and debt ratio
// ---------------------------------------------------------------------------

/// Maximum principal whose payment (insurance included) keeps the household
/// within the debt-ratio ceiling.
pub fn borrowing_capacity(table: &FinancingTable, input: &BorrowingCapacityInput) -> BorrowingCapacityResult {
    let ratio = input.max_debt_ratio.unwrap_or(table.max_debt_ratio);
    let available = (input.monthly_income - input.existing_monthly_charges) * ratio;

    if available <= Decimal::ZERO {
        return BorrowingCapacityResult {
            debt_ratio_used: ratio,
            max_monthly_payment: Decimal::ZERO,
            capacity: Decimal::ZERO,
            message: Some(
                "Vos charges actuelles ne laissent aucune capacité de remboursement \
                 dans la limite du taux d'endettement."
                    .into(),
            ),
        };
    }
    if input.duration_months == 0 {
        return BorrowingCapacityResult {
            debt_ratio_used: ratio,
            max_monthly_payment: round_cents(available),
            capacity: Decimal::ZERO,
            message: Some("La durée du prêt doit être d'au moins un mois.".into()),
        };
    }

    // Payment per euro borrowed
    let per_euro = time_value::pmt(input.annual_rate / dec!(12), input.duration_months, Decimal::ONE)
        + input.annual_insurance_rate.unwrap_or(Decimal::ZERO) / dec!(12);
    let capacity = if per_euro > Decimal::ZERO {
        available / per_euro
    } else {
        Decimal::ZERO
    };

    BorrowingCapacityResult {
        debt_ratio_used: ratio,
        max_monthly_payment: round_cents(available),
        capacity: round_money(capacity),
        message: None,
    }
}

/// Share of income consumed by existing charges plus the new payment.
pub fn evaluate_debt_ratio(table: &FinancingTable, input: &DebtRatioInput) -> DebtRatioResult {
    let total_charges = input.existing_monthly_charges + input.new_monthly_payment;
    let residual_income = input.monthly_income - total_charges;

    let (debt_ratio, acceptable, recommended) = if input.monthly_income > Decimal::ZERO {
        let ratio = total_charges / input.monthly_income;
        (
            round_rate(ratio),
            ratio < table.max_debt_ratio,
            ratio < table.comfortable_debt_ratio,
        )
    } else {
        (Decimal::ZERO, false, false)
    };

    DebtRatioResult {
        total_charges: round_cents(total_charges),
        debt_ratio,
        acceptable,
        recommended,
        residual_income: round_cents(residual_income),
        max_debt_ratio: table.max_debt_ratio,
        comfortable_debt_ratio: table.comfortable_debt_ratio,
    }
}
