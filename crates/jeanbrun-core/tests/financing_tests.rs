use jeanbrun_core::capital_gains::{calculate_capital_gains, CapitalGainsInput};
use jeanbrun_core::financing::{
    annual_breakdown, borrowing_capacity, calculate_loan, evaluate_debt_ratio, monthly_payment,
    BorrowingCapacityInput, DebtRatioInput, LoanInput,
};
use jeanbrun_core::{Money, TaxTables};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Loans
// ===========================================================================

fn loan(principal: Money, rate: Decimal, months: u32) -> LoanInput {
    LoanInput {
        principal,
        annual_rate: rate,
        duration_months: months,
        annual_insurance_rate: None,
    }
}

#[test]
fn test_schedule_totals_match_payments() {
    let r = calculate_loan(&loan(dec!(180_000), dec!(0.039), 300));
    let paid: Money = r.schedule.iter().map(|row| row.payment).sum();
    let interest: Money = r.schedule.iter().map(|row| row.interest).sum();
    let principal: Money = r.schedule.iter().map(|row| row.principal).sum();

    assert_eq!(principal, dec!(180_000));
    assert_eq!(paid, principal + interest);
    // Every row but the last pays the annuity
    assert!(r.schedule[..299].iter().all(|row| row.payment == r.monthly_payment));
    assert!((r.schedule[299].payment - r.monthly_payment).abs() < dec!(5));
}

#[test]
fn test_capacity_inverts_the_payment() {
    let tables = TaxTables::default();
    let capacity = borrowing_capacity(
        &tables.financing,
        &BorrowingCapacityInput {
            monthly_income: dec!(5_000),
            existing_monthly_charges: dec!(500),
            annual_rate: dec!(0.034),
            duration_months: 300,
            annual_insurance_rate: None,
            max_debt_ratio: None,
        },
    );
    assert_eq!(capacity.max_monthly_payment, dec!(1_575));
    let payment = monthly_payment(capacity.capacity, dec!(0.034), 300);
    assert!((payment - capacity.max_monthly_payment).abs() <= dec!(1), "got {payment}");
}

#[test]
fn test_capacity_with_insurance_is_lower() {
    let tables = TaxTables::default();
    let base = BorrowingCapacityInput {
        monthly_income: dec!(5_000),
        existing_monthly_charges: Decimal::ZERO,
        annual_rate: dec!(0.034),
        duration_months: 300,
        annual_insurance_rate: None,
        max_debt_ratio: None,
    };
    let insured = BorrowingCapacityInput {
        annual_insurance_rate: Some(dec!(0.0034)),
        ..base.clone()
    };
    assert!(
        borrowing_capacity(&tables.financing, &insured).capacity
            < borrowing_capacity(&tables.financing, &base).capacity
    );
}

#[test]
fn test_debt_ratio_between_comfort_and_regulatory_ceiling() {
    let tables = TaxTables::default();
    let r = evaluate_debt_ratio(
        &tables.financing,
        &DebtRatioInput {
            monthly_income: dec!(3_000),
            existing_monthly_charges: Decimal::ZERO,
            new_monthly_payment: dec!(1_020),
        },
    );
    assert_eq!(r.debt_ratio, dec!(0.34));
    assert!(r.acceptable);
    assert!(!r.recommended);
}

#[test]
fn test_debt_ratio_without_income_is_never_acceptable() {
    let tables = TaxTables::default();
    let r = evaluate_debt_ratio(
        &tables.financing,
        &DebtRatioInput {
            monthly_income: Decimal::ZERO,
            existing_monthly_charges: Decimal::ZERO,
            new_monthly_payment: dec!(500),
        },
    );
    assert_eq!(r.debt_ratio, Decimal::ZERO);
    assert!(!r.acceptable);
    assert_eq!(r.residual_income, dec!(-500));
}

#[test]
fn test_yearly_breakdown_with_partial_last_year() {
    let r = calculate_loan(&loan(dec!(50_000), dec!(0.03), 30));
    let years = annual_breakdown(&r.schedule);
    assert_eq!(years.len(), 3);
    assert_eq!(years[2].closing_balance, Decimal::ZERO);
    let principal: Money = years.iter().map(|y| y.principal).sum();
    assert_eq!(principal, dec!(50_000));
}

// ===========================================================================
// Capital gains
// ===========================================================================

#[test]
fn test_capital_gains_income_tax_exempt_at_22_years() {
    let tables = TaxTables::default();
    let r = calculate_capital_gains(
        &tables.capital_gains,
        &CapitalGainsInput {
            sale_price: dec!(400_000),
            purchase_price: dec!(200_000),
            acquisition_fees: Some(dec!(15_000)),
            works: Some(dec!(0)),
            holding_years: 22,
            depreciation_claimed: Decimal::ZERO,
        },
    );
    assert_eq!(r.gross_gain, dec!(185_000));
    assert_eq!(r.income_tax, Decimal::ZERO);
    assert_eq!(r.surtax, Decimal::ZERO);
    // Social charges still due on 72% of the gain
    assert_eq!(r.social_base, dec!(133_200));
    assert!(r.social_charges > Decimal::ZERO);
    assert!(!r.exempt);
}

#[test]
fn test_effective_rate_falls_with_holding_period() {
    let tables = TaxTables::default();
    let rate_after = |years: u32| {
        calculate_capital_gains(
            &tables.capital_gains,
            &CapitalGainsInput {
                sale_price: dec!(350_000),
                purchase_price: dec!(250_000),
                acquisition_fees: None,
                works: None,
                holding_years: years,
                depreciation_claimed: Decimal::ZERO,
            },
        )
        .effective_rate
    };
    assert!(rate_after(8) < rate_after(5));
    assert!(rate_after(15) < rate_after(8));
    assert_eq!(rate_after(30), Decimal::ZERO);
}
