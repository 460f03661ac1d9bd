//! Full Jeanbrun simulation: every calculator composed into a yearly
//! projection over the rental commitment.
//!
//! The pipeline runs in a fixed order. Each stage takes the outputs of the
//! previous ones and never fails once the input has passed validation:
//!
//! 1. household: income tax and marginal rate (TMI)
//! 2. scheme: Jeanbrun amortization for the property type
//! 3. financing (optional): loan, yearly breakdown, debt ratio, capacity
//! 4. rental: rent (given or ceiling), charges
//! 5. projection: scheme path and baseline path, year by year
//! 6. LMNP comparison (optional)
//! 7. capital-gains exit (optional)
//! 8. synthesis

use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capital_gains::{calculate_capital_gains, CapitalGainsInput, CapitalGainsResult};
use crate::deficit_foncier::{
    calculate_deficit_foncier, carry_forward_ledger, CarryForwardLedger, DeficitFoncierInput,
    DeficitFoncierResult, DeficitPool,
};
use crate::error::EngineError;
use crate::financing::{
    annual_breakdown, borrowing_capacity, calculate_loan, evaluate_debt_ratio, BorrowingCapacityInput,
    BorrowingCapacityResult, DebtRatioInput, DebtRatioResult, LoanInput, LoanResult, LoanYear, MAX_ANNUAL_RATE,
};
use crate::income_tax::{
    calculate_income_tax, tax_saving_from_deduction, FiscalSituation, IncomeTaxInput, IncomeTaxResult,
};
use crate::jeanbrun::{
    calculate_new_build, calculate_renovated, monthly_rent_ceiling, FiscalZone, JeanbrunOutcome,
    PropertyType, RenovatedOutcome, RentCeiling, RentTier,
};
use crate::lmnp::{calculate_lmnp, compare_with_jeanbrun, LmnpInput, LmnpResult, RegimeComparison, RentalType};
use crate::tables::{DeficitFoncierTable, TaxTables};
use crate::types::{ratio_or_zero, round_money, round_rate, with_metadata, ComputationOutput, Money, Parts, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdInput {
    pub taxable_income: Money,
    pub parts: Parts,
    #[serde(default)]
    pub situation: FiscalSituation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInput {
    pub property_type: PropertyType,
    /// Acquisition price, notary fees excluded
    pub price: Money,
    /// Renovation works (renovated property)
    #[serde(default)]
    pub works: Money,
    /// Living surface in m²
    pub surface: Decimal,
    pub zone: FiscalZone,
    pub tier: RentTier,
    /// Works qualify as energy renovation (bonified deficit cap)
    #[serde(default)]
    pub energy_works: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingInput {
    #[serde(default)]
    pub down_payment: Money,
    pub annual_rate: Rate,
    pub duration_years: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_insurance_rate: Option<Rate>,
    /// Net monthly income used for the debt ratio; taxable income / 12 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_net_income: Option<Money>,
    #[serde(default)]
    pub existing_monthly_charges: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RentalInput {
    /// Defaults to the rent ceiling of the zone and tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<Money>,
    #[serde(default)]
    pub monthly_coownership_charges: Money,
    #[serde(default)]
    pub annual_property_tax: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LmnpScenario {
    #[serde(default)]
    pub rental_type: RentalType,
    #[serde(default)]
    pub furniture_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitScenario {
    pub holding_years: u32,
    pub resale_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInput {
    pub household: HouseholdInput,
    pub property: PropertyInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingInput>,
    #[serde(default)]
    pub rental: RentalInput,
    /// Compare with a furnished rental when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmnp: Option<LmnpScenario>,
    /// Compute the resale taxation when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitScenario>,
    /// First calendar year of the projection; the tables' tax year when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingSummary {
    pub notary_fees: Money,
    pub loan_amount: Money,
    pub loan: LoanResult,
    pub yearly: Vec<LoanYear>,
    pub debt_ratio: DebtRatioResult,
    pub borrowing_capacity: BorrowingCapacityResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalSummary {
    pub monthly_rent: Money,
    pub annual_rent: Money,
    pub annual_charges: Money,
    pub rent_ceiling: RentCeiling,
    pub rent_above_ceiling: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub year: u32,
    pub calendar_year: i32,
    pub rent: Money,
    pub charges: Money,
    pub loan_interest: Money,
    /// Loan payments including insurance
    pub loan_payments: Money,
    pub amortization: Money,
    /// Rent minus charges, interest and amortization
    pub property_result: Money,
    pub deficit_deducted_from_income: Money,
    /// Carry-forward balance at the end of the year
    pub deficit_carried_forward: Money,
    pub taxable_income: Money,
    /// Tax on the property result; negative when a deduction lowers the
    /// household's income tax
    pub tax_due: Money,
    pub tax_saving: Money,
    pub net_cash_flow: Money,
    pub cumulative_tax_saving: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitSummary {
    pub first_year: DeficitFoncierResult,
    pub ledger: CarryForwardLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmnpComparison {
    pub lmnp: LmnpResult,
    pub comparison: RegimeComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub engagement_years: u32,
    pub annual_amortization: Money,
    pub annual_tax_saving: Money,
    pub total_tax_saving: Money,
    pub gross_yield: Rate,
    pub net_yield: Rate,
    /// Net yield after the average tax due
    pub net_net_yield: Rate,
    pub monthly_cash_flow: Money,
    pub notary_fees: Money,
    /// Price, works and notary fees
    pub total_investment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub income_tax: IncomeTaxResult,
    pub jeanbrun: JeanbrunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financing: Option<FinancingSummary>,
    pub rental: RentalSummary,
    pub projection: Vec<ProjectionRow>,
    pub deficit: DeficitSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmnp: Option<LmnpComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_gains: Option<CapitalGainsResult>,
    pub synthesis: Synthesis,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run the simulation against the baseline tables.
pub fn simulate(input: &SimulationInput) -> EngineResult<ComputationOutput<SimulationResult>> {
    simulate_with_tables(input, &TaxTables::default())
}

/// Run the simulation against `tables`.
pub fn simulate_with_tables(
    input: &SimulationInput,
    tables: &TaxTables,
) -> EngineResult<ComputationOutput<SimulationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    tables.validate()?;
    validate_simulation_input(input)?;

    let income_tax = household_stage(tables, &input.household);
    let marginal_rate = income_tax.marginal_rate;

    let jeanbrun = scheme_stage(tables, &input.property, &mut warnings);
    let notary_fees = notary_fees(tables, &input.property);

    let financing = input
        .financing
        .as_ref()
        .map(|f| financing_stage(tables, input, f, notary_fees, &mut warnings));

    let rental = rental_stage(tables, &input.property, &input.rental, &mut warnings);

    let ctx = ProjectionContext {
        start_year: input.start_year.unwrap_or(tables.tax_year),
        marginal_rate,
        amortization: jeanbrun.annual_amortization(),
        energy_works: input.property.energy_works && input.property.property_type == PropertyType::Renovated,
    };
    let projection = projection_stage(
        tables,
        ctx,
        &rental,
        financing.as_ref().map(|f| f.yearly.as_slice()).unwrap_or(&[]),
        &mut warnings,
    );

    let deficit = deficit_summary(&tables.deficit_foncier, &projection, ctx.energy_works);

    let lmnp = input.lmnp.as_ref().map(|scenario| {
        lmnp_stage(
            tables,
            &input.property,
            scenario,
            &rental,
            &projection,
            marginal_rate,
            &mut warnings,
        )
    });

    let capital_gains = input
        .exit
        .as_ref()
        .map(|exit| exit_stage(tables, &input.property, exit, notary_fees, &jeanbrun));

    let synthesis = synthesis_stage(
        tables,
        &input.property,
        &jeanbrun,
        &rental,
        &projection.rows,
        notary_fees,
    );

    let result = SimulationResult {
        income_tax,
        jeanbrun,
        financing,
        rental,
        projection: projection.rows,
        deficit,
        lmnp,
        capital_gains,
        synthesis,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Jeanbrun rental investment: income tax, amortization, deficit foncier and financing over the rental commitment",
        input,
        warnings,
        tables.tax_year,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_simulation_input(input: &SimulationInput) -> EngineResult<()> {
    if input.household.parts < Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "household.parts".into(),
            reason: "Number of fiscal parts cannot be negative".into(),
        });
    }
    if input.property.works < Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "property.works".into(),
            reason: "Works amount cannot be negative".into(),
        });
    }
    if let Some(f) = &input.financing {
        if f.annual_rate < Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                field: "financing.annual_rate".into(),
                reason: "Loan rate cannot be negative".into(),
            });
        }
        if f.annual_rate > MAX_ANNUAL_RATE {
            return Err(EngineError::InvalidInput {
                field: "financing.annual_rate".into(),
                reason: format!("Loan rate cannot exceed {MAX_ANNUAL_RATE}"),
            });
        }
        if f.annual_insurance_rate.is_some_and(|r| r < Decimal::ZERO) {
            return Err(EngineError::InvalidInput {
                field: "financing.annual_insurance_rate".into(),
                reason: "Insurance rate cannot be negative".into(),
            });
        }
        if f.duration_years == 0 {
            return Err(EngineError::InvalidInput {
                field: "financing.duration_years".into(),
                reason: "Loan duration must be at least 1 year".into(),
            });
        }
        if f.down_payment < Decimal::ZERO {
            return Err(EngineError::InvalidInput {
                field: "financing.down_payment".into(),
                reason: "Down payment cannot be negative".into(),
            });
        }
    }
    if input.lmnp.as_ref().is_some_and(|l| l.furniture_value < Decimal::ZERO) {
        return Err(EngineError::InvalidInput {
            field: "lmnp.furniture_value".into(),
            reason: "Furniture value cannot be negative".into(),
        });
    }
    Ok(())
}

fn push_warning(warnings: &mut Vec<String>, message: String) {
    warn!("{message}");
    warnings.push(message);
}

// ---------------------------------------------------------------------------
// Stages 1-4
// ---------------------------------------------------------------------------

fn household_stage(tables: &TaxTables, household: &HouseholdInput) -> IncomeTaxResult {
    let result = calculate_income_tax(
        &tables.income_tax,
        &IncomeTaxInput {
            taxable_income: household.taxable_income,
            parts: household.parts,
            situation: household.situation,
        },
    );
    debug!(
        marginal_rate = %result.marginal_rate,
        net_tax = %result.net_tax,
        "household stage"
    );
    result
}

fn scheme_stage(tables: &TaxTables, property: &PropertyInput, warnings: &mut Vec<String>) -> JeanbrunOutcome {
    let outcome = match property.property_type {
        PropertyType::New => JeanbrunOutcome::New(calculate_new_build(&tables.jeanbrun, property.price, property.tier)),
        PropertyType::Renovated => JeanbrunOutcome::Renovated(calculate_renovated(
            &tables.jeanbrun,
            property.price,
            property.works,
            property.tier,
        )),
    };

    if let JeanbrunOutcome::Renovated(RenovatedOutcome::Ineligible(r)) = &outcome {
        push_warning(
            warnings,
            format!(
                "Renovation works fall {} short of the {} required: no Jeanbrun amortization",
                r.shortfall, r.required_renovation
            ),
        );
    }
    debug!(amortization = %outcome.annual_amortization(), eligible = outcome.is_eligible(), "scheme stage");
    outcome
}

fn notary_fees(tables: &TaxTables, property: &PropertyInput) -> Money {
    let rate = match property.property_type {
        PropertyType::New => tables.financing.notary_fee_new,
        PropertyType::Renovated => tables.financing.notary_fee_renovated,
    };
    round_money(property.price.max(Decimal::ZERO) * rate)
}

fn financing_stage(
    tables: &TaxTables,
    input: &SimulationInput,
    financing: &FinancingInput,
    notary_fees: Money,
    warnings: &mut Vec<String>,
) -> FinancingSummary {
    let property = &input.property;
    let loan_amount =
        (property.price.max(Decimal::ZERO) + property.works + notary_fees - financing.down_payment).max(Decimal::ZERO);
    let duration_months = financing.duration_years * 12;

    let loan = calculate_loan(&LoanInput {
        principal: loan_amount,
        annual_rate: financing.annual_rate,
        duration_months,
        annual_insurance_rate: financing.annual_insurance_rate,
    });
    let yearly = annual_breakdown(&loan.schedule);

    let monthly_income = financing
        .monthly_net_income
        .unwrap_or_else(|| round_money(input.household.taxable_income.max(Decimal::ZERO) / dec!(12)));

    let debt_ratio = evaluate_debt_ratio(
        &tables.financing,
        &DebtRatioInput {
            monthly_income,
            existing_monthly_charges: financing.existing_monthly_charges,
            new_monthly_payment: loan.monthly_payment_with_insurance,
        },
    );
    if !debt_ratio.acceptable {
        push_warning(
            warnings,
            format!(
                "Debt ratio of {} exceeds the {} regulatory ceiling",
                debt_ratio.debt_ratio, debt_ratio.max_debt_ratio
            ),
        );
    }

    let capacity = borrowing_capacity(
        &tables.financing,
        &BorrowingCapacityInput {
            monthly_income,
            existing_monthly_charges: financing.existing_monthly_charges,
            annual_rate: financing.annual_rate,
            duration_months,
            annual_insurance_rate: financing.annual_insurance_rate,
            max_debt_ratio: None,
        },
    );

    debug!(
        loan_amount = %loan_amount,
        monthly_payment = %loan.monthly_payment_with_insurance,
        debt_ratio = %debt_ratio.debt_ratio,
        "financing stage"
    );

    FinancingSummary {
        notary_fees,
        loan_amount: round_money(loan_amount),
        loan,
        yearly,
        debt_ratio,
        borrowing_capacity: capacity,
    }
}

fn rental_stage(
    tables: &TaxTables,
    property: &PropertyInput,
    rental: &RentalInput,
    warnings: &mut Vec<String>,
) -> RentalSummary {
    let ceiling = monthly_rent_ceiling(&tables.rent_ceilings, property.zone, property.tier, property.surface);
    let monthly_rent = rental.monthly_rent.unwrap_or(ceiling.monthly_ceiling);
    let rent_above_ceiling = monthly_rent > ceiling.monthly_ceiling;
    if rent_above_ceiling {
        push_warning(
            warnings,
            format!(
                "Monthly rent of {} exceeds the {} ceiling for this zone and tier",
                monthly_rent, ceiling.monthly_ceiling
            ),
        );
    }

    let annual_charges = rental.monthly_coownership_charges * dec!(12) + rental.annual_property_tax;
    debug!(monthly_rent = %monthly_rent, annual_charges = %annual_charges, "rental stage");

    RentalSummary {
        monthly_rent,
        annual_rent: round_money(monthly_rent * dec!(12)),
        annual_charges: round_money(annual_charges),
        rent_ceiling: ceiling,
        rent_above_ceiling,
    }
}

// ---------------------------------------------------------------------------
// Stage 5: projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ProjectionContext {
    start_year: i32,
    marginal_rate: Rate,
    amortization: Money,
    energy_works: bool,
}

struct YearFlows {
    rent: Money,
    charges: Money,
    interest: Money,
    energy_works: bool,
    evaluation_date: NaiveDate,
}

struct PathYear {
    property_result: Money,
    deducted: Money,
    taxable_income: Money,
    tax: Money,
    carried_balance: Money,
}

/// Property taxation of one scenario across the years, with its own
/// carry-forward pool.
struct TaxPath {
    pool: DeficitPool,
    marginal_rate: Rate,
    property_income_rate: Rate,
}

impl TaxPath {
    fn new(tables: &TaxTables, marginal_rate: Rate) -> Self {
        TaxPath {
            pool: DeficitPool::new(tables.deficit_foncier.carry_forward_years),
            marginal_rate,
            property_income_rate: marginal_rate + tables.social_charges_rate,
        }
    }

    fn run_year(&mut self, table: &DeficitFoncierTable, year: u32, flows: &YearFlows) -> PathYear {
        let property_result = flows.rent - flows.charges - flows.interest;

        if property_result >= Decimal::ZERO {
            let absorbed = self.pool.absorb(year, property_result);
            let taxable_income = property_result - absorbed;
            return PathYear {
                property_result,
                deducted: Decimal::ZERO,
                taxable_income,
                tax: round_money(taxable_income * self.property_income_rate),
                carried_balance: self.pool.balance(),
            };
        }

        self.pool.expire(year);
        let split = calculate_deficit_foncier(
            table,
            &DeficitFoncierInput {
                rent: flows.rent,
                deductible_charges: flows.charges,
                loan_interest: flows.interest,
                energy_works: flows.energy_works,
                evaluation_date: flows.evaluation_date,
            },
        );
        self.pool.add(year, split.carried_forward);

        PathYear {
            property_result,
            deducted: split.deductible_from_income,
            taxable_income: Decimal::ZERO,
            tax: -tax_saving_from_deduction(split.deductible_from_income, self.marginal_rate),
            carried_balance: self.pool.balance(),
        }
    }
}

struct Projection {
    rows: Vec<ProjectionRow>,
    baseline_total_tax: Money,
    yearly_interest: Vec<Money>,
}

fn year_end(calendar_year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(calendar_year, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn projection_stage(
    tables: &TaxTables,
    ctx: ProjectionContext,
    rental: &RentalSummary,
    loan_years: &[LoanYear],
    warnings: &mut Vec<String>,
) -> Projection {
    let deficit_table = &tables.deficit_foncier;
    let years = tables.jeanbrun.engagement_years;

    let mut scheme = TaxPath::new(tables, ctx.marginal_rate);
    let mut baseline = TaxPath::new(tables, ctx.marginal_rate);
    let mut rows = Vec::with_capacity(years as usize);
    let mut yearly_interest = Vec::with_capacity(years as usize);
    let mut baseline_total_tax = Decimal::ZERO;
    let mut cumulative = Decimal::ZERO;

    for year in 1..=years {
        let calendar_year = ctx.start_year + year as i32 - 1;
        let loan_year = loan_years.get(year as usize - 1);
        let interest = loan_year.map_or(Decimal::ZERO, |l| l.interest);
        let loan_payments = loan_year.map_or(Decimal::ZERO, |l| l.payments);

        let flows = YearFlows {
            rent: rental.annual_rent,
            charges: rental.annual_charges + ctx.amortization,
            interest,
            energy_works: ctx.energy_works,
            evaluation_date: year_end(calendar_year),
        };
        let with_scheme = scheme.run_year(deficit_table, year, &flows);
        let without_scheme = baseline.run_year(
            deficit_table,
            year,
            &YearFlows {
                charges: rental.annual_charges,
                ..flows
            },
        );

        let tax_saving = without_scheme.tax - with_scheme.tax;
        cumulative += tax_saving;
        baseline_total_tax += without_scheme.tax;
        yearly_interest.push(interest);

        rows.push(ProjectionRow {
            year,
            calendar_year,
            rent: rental.annual_rent,
            charges: rental.annual_charges,
            loan_interest: round_money(interest),
            loan_payments: round_money(loan_payments),
            amortization: ctx.amortization,
            property_result: round_money(with_scheme.property_result),
            deficit_deducted_from_income: with_scheme.deducted,
            deficit_carried_forward: round_money(with_scheme.carried_balance),
            taxable_income: round_money(with_scheme.taxable_income),
            tax_due: with_scheme.tax,
            tax_saving,
            net_cash_flow: round_money(rental.annual_rent - rental.annual_charges - loan_payments - with_scheme.tax),
            cumulative_tax_saving: cumulative,
        });
    }

    let leftover = scheme.pool.balance();
    if leftover > Decimal::ZERO {
        push_warning(
            warnings,
            format!(
                "{} of deficit is still carried forward at the end of the {years}-year commitment and expires if not absorbed",
                round_money(leftover)
            ),
        );
    }
    debug!(years, cumulative_tax_saving = %cumulative, "projection stage");

    Projection {
        rows,
        baseline_total_tax,
        yearly_interest,
    }
}

/// First-year split and its carry-forward against the following years.
fn deficit_summary(table: &DeficitFoncierTable, projection: &Projection, energy_works: bool) -> DeficitSummary {
    let Some(first) = projection.rows.first() else {
        return DeficitSummary {
            first_year: calculate_deficit_foncier(
                table,
                &DeficitFoncierInput {
                    rent: Decimal::ZERO,
                    deductible_charges: Decimal::ZERO,
                    loan_interest: Decimal::ZERO,
                    energy_works: false,
                    evaluation_date: table.bonified_until,
                },
            ),
            ledger: carry_forward_ledger(table, Decimal::ZERO, &[]),
        };
    };

    let first_year = calculate_deficit_foncier(
        table,
        &DeficitFoncierInput {
            rent: first.rent,
            deductible_charges: first.charges + first.amortization,
            loan_interest: first.loan_interest,
            energy_works,
            evaluation_date: year_end(first.calendar_year),
        },
    );
    let later_results: Vec<Money> = projection.rows.iter().skip(1).map(|r| r.property_result).collect();
    let ledger = carry_forward_ledger(table, first_year.carried_forward, &later_results);

    DeficitSummary { first_year, ledger }
}

// ---------------------------------------------------------------------------
// Stages 6-8
// ---------------------------------------------------------------------------

fn lmnp_stage(
    tables: &TaxTables,
    property: &PropertyInput,
    scenario: &LmnpScenario,
    rental: &RentalSummary,
    projection: &Projection,
    marginal_rate: Rate,
    warnings: &mut Vec<String>,
) -> LmnpComparison {
    let years = tables.jeanbrun.engagement_years;
    let lmnp = calculate_lmnp(
        &tables.lmnp,
        &LmnpInput {
            annual_rent: rental.annual_rent,
            annual_charges: rental.annual_charges,
            yearly_loan_interest: projection.yearly_interest.clone(),
            property_price: property.price.max(Decimal::ZERO) + property.works,
            furniture_value: scenario.furniture_value,
            rental_type: scenario.rental_type,
            marginal_rate,
            social_charges_rate: tables.social_charges_rate,
            years,
        },
    );
    if !lmnp.micro_bic.eligible {
        push_warning(
            warnings,
            format!(
                "Annual rent of {} exceeds the {} micro-BIC ceiling: only the itemized regime applies",
                rental.annual_rent, lmnp.micro_bic.receipts_ceiling
            ),
        );
    }

    let jeanbrun_total_saving = projection
        .rows
        .last()
        .map_or(Decimal::ZERO, |r| r.cumulative_tax_saving);
    let comparison = compare_with_jeanbrun(
        &tables.lmnp,
        &lmnp,
        projection.baseline_total_tax,
        jeanbrun_total_saving,
        years,
    );
    debug!(regime = ?lmnp.best_regime, recommendation = ?comparison.recommendation, "lmnp stage");

    LmnpComparison { lmnp, comparison }
}

fn exit_stage(
    tables: &TaxTables,
    property: &PropertyInput,
    exit: &ExitScenario,
    notary_fees: Money,
    jeanbrun: &JeanbrunOutcome,
) -> CapitalGainsResult {
    let amortized_years = exit.holding_years.min(tables.jeanbrun.engagement_years);
    let result = calculate_capital_gains(
        &tables.capital_gains,
        &CapitalGainsInput {
            sale_price: exit.resale_price,
            purchase_price: property.price,
            acquisition_fees: Some(notary_fees),
            works: (property.works > Decimal::ZERO).then_some(property.works),
            holding_years: exit.holding_years,
            depreciation_claimed: jeanbrun.annual_amortization() * Decimal::from(amortized_years),
        },
    );
    debug!(gross_gain = %result.gross_gain, total_tax = %result.total_tax, "exit stage");
    result
}

fn synthesis_stage(
    tables: &TaxTables,
    property: &PropertyInput,
    jeanbrun: &JeanbrunOutcome,
    rental: &RentalSummary,
    rows: &[ProjectionRow],
    notary_fees: Money,
) -> Synthesis {
    let years = tables.jeanbrun.engagement_years;
    let year_count = Decimal::from(years.max(1));
    let cost = property.price.max(Decimal::ZERO) + property.works;
    let total_investment = cost + notary_fees;

    let total_tax_saving: Money = rows.iter().map(|r| r.tax_saving).sum();
    let total_tax_due: Money = rows.iter().map(|r| r.tax_due).sum();
    let total_cash_flow: Money = rows.iter().map(|r| r.net_cash_flow).sum();

    let net_income = rental.annual_rent - rental.annual_charges;
    let average_tax = total_tax_due / year_count;

    Synthesis {
        engagement_years: years,
        annual_amortization: jeanbrun.annual_amortization(),
        annual_tax_saving: round_money(total_tax_saving / year_count),
        total_tax_saving,
        gross_yield: round_rate(ratio_or_zero(rental.annual_rent, cost)),
        net_yield: round_rate(ratio_or_zero(net_income, total_investment)),
        net_net_yield: round_rate(ratio_or_zero(net_income - average_tax, total_investment)),
        monthly_cash_flow: round_money(total_cash_flow / (year_count * dec!(12))),
        notary_fees,
        total_investment: round_money(total_investment),
    }
}
