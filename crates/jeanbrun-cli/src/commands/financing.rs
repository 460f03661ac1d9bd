use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use jeanbrun_core::financing::{
    self, BorrowingCapacityInput, DebtRatioInput, LoanInput, LoanResult, LoanYear, MAX_ANNUAL_RATE,
};
use jeanbrun_core::TaxTables;

use super::envelope;
use crate::input;

/// Arguments for the amortization schedule
#[derive(Args)]
pub struct LoanArgs {
    /// Amount borrowed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Nominal annual rate (e.g. 0.035 for 3.5%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Duration in months
    #[arg(long)]
    pub months: Option<u32>,

    /// Annual insurance rate on the initial principal
    #[arg(long)]
    pub insurance_rate: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the borrowing capacity
#[derive(Args)]
pub struct BorrowingCapacityArgs {
    /// Path to JSON input file with income, charges and loan terms
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the debt-ratio check
#[derive(Args)]
pub struct DebtRatioArgs {
    /// Net monthly household income
    #[arg(long)]
    pub income: Option<Decimal>,

    /// Existing monthly loan charges
    #[arg(long, default_value = "0")]
    pub charges: Decimal,

    /// Monthly payment of the new loan, insurance included
    #[arg(long)]
    pub payment: Option<Decimal>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoanReport {
    #[serde(flatten)]
    loan: LoanResult,
    yearly: Vec<LoanYear>,
}

fn check_rates(annual_rate: Decimal, insurance_rate: Option<Decimal>) -> Result<(), Box<dyn std::error::Error>> {
    if annual_rate < Decimal::ZERO || insurance_rate.is_some_and(|r| r < Decimal::ZERO) {
        return Err("rates must not be negative".into());
    }
    if annual_rate > MAX_ANNUAL_RATE {
        return Err(format!("annual_rate must not exceed {}", MAX_ANNUAL_RATE).into());
    }
    Ok(())
}

pub fn run_loan(args: LoanArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let loan_input: LoanInput = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => LoanInput {
            principal: args.principal.ok_or("--principal is required (or provide --input)")?,
            annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            duration_months: args.months.ok_or("--months is required (or provide --input)")?,
            annual_insurance_rate: args.insurance_rate,
        },
    };
    if loan_input.duration_months == 0 {
        return Err("duration_months must be at least 1".into());
    }
    check_rates(loan_input.annual_rate, loan_input.annual_insurance_rate)?;

    let loan = financing::calculate_loan(&loan_input);
    let yearly = financing::annual_breakdown(&loan.schedule);
    envelope(
        "Prêt amortissable à mensualités constantes",
        &loan_input,
        tables,
        start,
        LoanReport { loan, yearly },
    )
}

pub fn run_borrowing_capacity(
    args: BorrowingCapacityArgs,
    tables: &TaxTables,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let capacity_input: BorrowingCapacityInput = input::require_input(args.input.as_deref(), "borrowing-capacity")?;
    if capacity_input.duration_months == 0 {
        return Err("duration_months must be at least 1".into());
    }
    check_rates(capacity_input.annual_rate, capacity_input.annual_insurance_rate)?;

    let result = financing::borrowing_capacity(&tables.financing, &capacity_input);
    envelope("Capacité d'emprunt au taux d'endettement maximal", &capacity_input, tables, start, result)
}

pub fn run_debt_ratio(args: DebtRatioArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let ratio_input: DebtRatioInput = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => DebtRatioInput {
            monthly_income: args.income.ok_or("--income is required (or provide --input)")?,
            existing_monthly_charges: args.charges,
            new_monthly_payment: args.payment.ok_or("--payment is required (or provide --input)")?,
        },
    };

    let result = financing::evaluate_debt_ratio(&tables.financing, &ratio_input);
    envelope("Taux d'endettement (normes HCSF)", &ratio_input, tables, start, result)
}
