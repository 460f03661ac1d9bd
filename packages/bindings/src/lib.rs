use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use jeanbrun_core::jeanbrun::RentTier;
use jeanbrun_core::{Money, TaxTables};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn check_loan_terms(duration_months: u32, annual_rate: Decimal) -> NapiResult<()> {
    if duration_months == 0 {
        return Err(napi::Error::from_reason("duration_months must be at least 1"));
    }
    if annual_rate < Decimal::ZERO || annual_rate > jeanbrun_core::financing::MAX_ANNUAL_RATE {
        return Err(napi::Error::from_reason(format!(
            "annual_rate must be between 0 and {}",
            jeanbrun_core::financing::MAX_ANNUAL_RATE
        )));
    }
    Ok(())
}

fn tables_from(tables_json: Option<String>) -> NapiResult<TaxTables> {
    let tables = match tables_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => TaxTables::default(),
    };
    tables.validate().map_err(to_napi_error)?;
    Ok(tables)
}

#[derive(Deserialize)]
struct NewBuildRequest {
    price: Money,
    tier: RentTier,
}

#[derive(Deserialize)]
struct RenovatedRequest {
    purchase_price: Money,
    works: Money,
    tier: RentTier,
}

#[derive(Deserialize)]
struct LedgerRequest {
    initial_deficit: Money,
    future_incomes: Vec<Money>,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[napi]
pub fn simulate(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::SimulationInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::simulate_with_tables(&input, &tables).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn default_tables() -> NapiResult<String> {
    serde_json::to_string(&TaxTables::default()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Tax
// ---------------------------------------------------------------------------

#[napi]
pub fn income_tax(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::income_tax::IncomeTaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    if input.parts <= Decimal::ZERO {
        return Err(napi::Error::from_reason("parts must be positive"));
    }
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::income_tax::calculate_income_tax(&tables.income_tax, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn jeanbrun_new(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: NewBuildRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::jeanbrun::calculate_new_build(&tables.jeanbrun, input.price, input.tier);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn jeanbrun_renovated(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: RenovatedRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    if input.works < Decimal::ZERO {
        return Err(napi::Error::from_reason("works must not be negative"));
    }
    let tables = tables_from(tables_json)?;
    let output =
        jeanbrun_core::jeanbrun::calculate_renovated(&tables.jeanbrun, input.purchase_price, input.works, input.tier);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn deficit_foncier(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::deficit_foncier::DeficitFoncierInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::deficit_foncier::calculate_deficit_foncier(&tables.deficit_foncier, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn deficit_carry_forward(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: LedgerRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::deficit_foncier::carry_forward_ledger(
        &tables.deficit_foncier,
        input.initial_deficit,
        &input.future_incomes,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn capital_gains(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::capital_gains::CapitalGainsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::capital_gains::calculate_capital_gains(&tables.capital_gains, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn lmnp(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::lmnp::LmnpInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::lmnp::calculate_lmnp(&tables.lmnp, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[napi]
pub fn loan_schedule(input_json: String) -> NapiResult<String> {
    let input: jeanbrun_core::financing::LoanInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    check_loan_terms(input.duration_months, input.annual_rate)?;
    let output = jeanbrun_core::financing::calculate_loan(&input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn borrowing_capacity(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::financing::BorrowingCapacityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    check_loan_terms(input.duration_months, input.annual_rate)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::financing::borrowing_capacity(&tables.financing, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn debt_ratio(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: jeanbrun_core::financing::DebtRatioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = jeanbrun_core::financing::evaluate_debt_ratio(&tables.financing, &input);
    serde_json::to_string(&output).map_err(to_napi_error)
}
