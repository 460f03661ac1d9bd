use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use jeanbrun_core::capital_gains::{self, CapitalGainsInput};
use jeanbrun_core::deficit_foncier::{self, CarryForwardLedger, DeficitFoncierInput, DeficitFoncierResult};
use jeanbrun_core::income_tax::{self, FiscalSituation, IncomeTaxInput};
use jeanbrun_core::jeanbrun::{self, RentTier};
use jeanbrun_core::lmnp::{self, LmnpInput};
use jeanbrun_core::{Money, TaxTables};

use super::{envelope, TierArg};
use crate::input;

/// Arguments for the household income tax
#[derive(Args)]
pub struct IncomeTaxArgs {
    /// Net taxable household income
    #[arg(long)]
    pub income: Option<Decimal>,

    /// Number of fiscal parts
    #[arg(long)]
    pub parts: Option<Decimal>,

    /// File as a couple (two baseline parts)
    #[arg(long)]
    pub couple: bool,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the new-build amortization
#[derive(Args)]
pub struct JeanbrunNewArgs {
    /// Acquisition price
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Rent tier committed to
    #[arg(long, value_enum)]
    pub tier: Option<TierArg>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the renovated-property amortization
#[derive(Args)]
pub struct JeanbrunRenovatedArgs {
    /// Purchase price excluding works
    #[arg(long)]
    pub purchase_price: Option<Decimal>,

    /// Qualifying renovation works
    #[arg(long)]
    pub works: Option<Decimal>,

    #[arg(long, value_enum)]
    pub tier: Option<TierArg>,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the property deficit split
#[derive(Args)]
pub struct DeficitFoncierArgs {
    /// Path to JSON input file (rent, charges, interest, evaluation date)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the capital gains on resale
#[derive(Args)]
pub struct CapitalGainsArgs {
    /// Path to JSON input file with sale and acquisition data
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the furnished-rental comparison
#[derive(Args)]
pub struct LmnpArgs {
    /// Path to JSON input file with rent, charges and property value
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NewBuildRequest {
    price: Money,
    tier: RentTier,
}

#[derive(Debug, Serialize, Deserialize)]
struct RenovatedRequest {
    purchase_price: Money,
    works: Money,
    tier: RentTier,
}

#[derive(Debug, Serialize, Deserialize)]
struct DeficitRequest {
    #[serde(flatten)]
    deficit: DeficitFoncierInput,
    /// Property income of the following years, against which the carried
    /// deficit is absorbed
    #[serde(default)]
    future_incomes: Vec<Money>,
}

#[derive(Debug, Serialize)]
struct DeficitReport {
    split: DeficitFoncierResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger: Option<CarryForwardLedger>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn run_income_tax(args: IncomeTaxArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let tax_input: IncomeTaxInput = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => {
            let situation = if args.couple {
                FiscalSituation::Couple
            } else {
                FiscalSituation::Single
            };
            IncomeTaxInput {
                taxable_income: args.income.ok_or("--income is required (or provide --input)")?,
                parts: args.parts.unwrap_or_else(|| situation.baseline_parts()),
                situation,
            }
        }
    };
    if tax_input.parts <= Decimal::ZERO {
        return Err("parts must be positive".into());
    }

    let result = income_tax::calculate_income_tax(&tables.income_tax, &tax_input);
    envelope("Barème progressif avec quotient familial et décote", &tax_input, tables, start, result)
}

pub fn run_jeanbrun_new(args: JeanbrunNewArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: NewBuildRequest = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => NewBuildRequest {
            price: args.price.ok_or("--price is required (or provide --input)")?,
            tier: args.tier.ok_or("--tier is required (or provide --input)")?.into(),
        },
    };

    let result = jeanbrun::calculate_new_build(&tables.jeanbrun, request.price, request.tier);
    envelope("Amortissement Jeanbrun neuf", &request, tables, start, result)
}

pub fn run_jeanbrun_renovated(
    args: JeanbrunRenovatedArgs,
    tables: &TaxTables,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: RenovatedRequest = match input::read_input(args.input.as_deref())? {
        Some(parsed) => parsed,
        None => RenovatedRequest {
            purchase_price: args
                .purchase_price
                .ok_or("--purchase-price is required (or provide --input)")?,
            works: args.works.ok_or("--works is required (or provide --input)")?,
            tier: args.tier.ok_or("--tier is required (or provide --input)")?.into(),
        },
    };
    if request.works < Decimal::ZERO {
        return Err("works must not be negative".into());
    }

    let result = jeanbrun::calculate_renovated(&tables.jeanbrun, request.purchase_price, request.works, request.tier);
    envelope("Amortissement Jeanbrun ancien rénové", &request, tables, start, result)
}

pub fn run_deficit_foncier(args: DeficitFoncierArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request: DeficitRequest = input::require_input(args.input.as_deref(), "deficit-foncier")?;

    let split = deficit_foncier::calculate_deficit_foncier(&tables.deficit_foncier, &request.deficit);
    let ledger = (!request.future_incomes.is_empty()).then(|| {
        deficit_foncier::carry_forward_ledger(&tables.deficit_foncier, split.carried_forward, &request.future_incomes)
    });

    envelope(
        "Imputation du déficit foncier sur le revenu global",
        &request,
        tables,
        start,
        DeficitReport { split, ledger },
    )
}

pub fn run_capital_gains(args: CapitalGainsArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let gains_input: CapitalGainsInput = input::require_input(args.input.as_deref(), "capital-gains")?;

    let result = capital_gains::calculate_capital_gains(&tables.capital_gains, &gains_input);
    envelope("Plus-value immobilière des particuliers", &gains_input, tables, start, result)
}

pub fn run_lmnp(args: LmnpArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let lmnp_input: LmnpInput = input::require_input(args.input.as_deref(), "lmnp")?;

    let result = lmnp::calculate_lmnp(&tables.lmnp, &lmnp_input);
    envelope("LMNP micro-BIC et régime réel", &lmnp_input, tables, start, result)
}
