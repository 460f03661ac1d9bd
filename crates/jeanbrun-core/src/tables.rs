//! Static fiscal parameters.
//!
//! Every calculator reads its thresholds from one of the sub-tables below,
//! passed in by reference. `TaxTables::default()` is the 2026 baseline; an
//! alternate tax year is just another `TaxTables` value (the CLI loads one
//! from JSON or YAML).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::jeanbrun::{FiscalZone, RentTier};
use crate::types::{Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Bracket tables
// ---------------------------------------------------------------------------

/// One progressive bracket, `[lower, upper)`. `upper = None` is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower: Money,
    pub upper: Option<Money>,
    pub rate: Rate,
}

/// Ordered, contiguous brackets covering `[0, +inf)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BracketTable {
    brackets: Vec<TaxBracket>,
}

impl BracketTable {
    pub fn new(brackets: Vec<TaxBracket>) -> EngineResult<Self> {
        let table = BracketTable { brackets };
        table.validate("brackets")?;
        Ok(table)
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Bracket containing `amount`, with its index. Negative amounts map to
    /// the first bracket; amounts past every bound map to the last one.
    pub fn locate(&self, amount: Money) -> Option<(usize, &TaxBracket)> {
        self.brackets
            .iter()
            .enumerate()
            .find(|(_, b)| b.upper.map_or(true, |upper| amount < upper))
            .or_else(|| self.brackets.iter().enumerate().last())
    }

    pub fn top_rate(&self) -> Rate {
        self.brackets.last().map_or(Decimal::ZERO, |b| b.rate)
    }

    pub fn validate(&self, name: &str) -> EngineResult<()> {
        let invalid = |reason: String| EngineError::InvalidTable {
            table: name.to_string(),
            reason,
        };

        let first = self
            .brackets
            .first()
            .ok_or_else(|| invalid("Bracket table is empty".into()))?;
        if !first.lower.is_zero() {
            return Err(invalid(format!(
                "First bracket must start at 0, starts at {}",
                first.lower
            )));
        }

        for (i, bracket) in self.brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(invalid(format!("Bracket {i} rate must be between 0 and 1")));
            }
            let is_last = i + 1 == self.brackets.len();
            match (bracket.upper, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(invalid(format!("Only the last bracket may be unbounded (bracket {i})")));
                }
                (Some(_), true) => {
                    return Err(invalid("Last bracket must be unbounded".into()));
                }
                (Some(upper), false) => {
                    if upper <= bracket.lower {
                        return Err(invalid(format!("Bracket {i} upper bound must exceed its lower bound")));
                    }
                    let next = &self.brackets[i + 1];
                    if next.lower != upper {
                        return Err(invalid(format!(
                            "Bracket {} must start where bracket {i} ends ({upper})",
                            i + 1
                        )));
                    }
                    if next.rate < bracket.rate {
                        return Err(invalid(format!("Rates must be non-decreasing (bracket {})", i + 1)));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Income tax
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoteTable {
    pub single_base: Money,
    pub single_threshold: Money,
    pub couple_base: Money,
    pub couple_threshold: Money,
    pub factor: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxTable {
    /// Brackets applied to the quotient familial (income per part)
    pub brackets: BracketTable,
    /// Maximum tax advantage per half-share beyond the baseline parts
    pub qf_cap_per_half_share: Money,
    pub decote: DecoteTable,
}

// ---------------------------------------------------------------------------
// Jeanbrun
// ---------------------------------------------------------------------------

/// One value per rent tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByTier<T> {
    pub intermediate: T,
    pub social: T,
    pub very_social: T,
}

impl<T> ByTier<T> {
    pub fn get(&self, tier: RentTier) -> &T {
        match tier {
            RentTier::Intermediate => &self.intermediate,
            RentTier::Social => &self.social,
            RentTier::VerySocial => &self.very_social,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierParameters {
    pub rate: Rate,
    pub cap: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JeanbrunTable {
    /// Share of the price attributed to the building (the land is not depreciable)
    pub base_ratio: Rate,
    /// Rental commitment, in years
    pub engagement_years: u32,
    pub new_build: ByTier<TierParameters>,
    pub renovated_rates: ByTier<Rate>,
    /// Single annual cap for renovated property, whatever the tier
    pub renovated_cap: Money,
    /// Minimum works, as a share of the purchase price
    pub renovation_threshold: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByZone<T> {
    pub a_bis: T,
    pub a: T,
    pub b1: T,
    pub b2: T,
    pub c: T,
}

impl<T> ByZone<T> {
    pub fn get(&self, zone: FiscalZone) -> &T {
        match zone {
            FiscalZone::ABis => &self.a_bis,
            FiscalZone::A => &self.a,
            FiscalZone::B1 => &self.b1,
            FiscalZone::B2 => &self.b2,
            FiscalZone::C => &self.c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentCeilingTable {
    /// Monthly ceiling per m² for the intermediate tier
    pub per_square_meter: ByZone<Money>,
    pub surface_coefficient_base: Decimal,
    pub surface_coefficient_numerator: Decimal,
    pub surface_coefficient_max: Decimal,
    pub tier_coefficients: ByTier<Rate>,
}

// ---------------------------------------------------------------------------
// Deficit foncier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeficitFoncierTable {
    pub standard_cap: Money,
    /// Cap for energy-renovation works, while the evaluation date is on or
    /// before `bonified_until`
    pub bonified_cap: Money,
    pub bonified_until: NaiveDate,
    pub carry_forward_years: u32,
}

// ---------------------------------------------------------------------------
// Capital gains
// ---------------------------------------------------------------------------

/// `annual_rate` of abatement for each full holding year in
/// `[first_year, last_year]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbatementStep {
    pub first_year: u32,
    pub last_year: u32,
    pub annual_rate: Rate,
}

/// Surtax bracket applying to gains strictly above `lower`. With `smoothing`,
/// the tax is `rate * gain - (upper - gain) * smoothing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurtaxBracket {
    pub lower: Money,
    pub upper: Option<Money>,
    pub rate: Rate,
    pub smoothing: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalGainsTable {
    pub income_tax_rate: Rate,
    pub social_rate: Rate,
    pub income_tax_abatement: Vec<AbatementStep>,
    pub social_abatement: Vec<AbatementStep>,
    pub surtax: Vec<SurtaxBracket>,
    pub flat_acquisition_fee_rate: Rate,
    pub flat_works_rate: Rate,
    /// The flat works allowance needs strictly more full years than this
    pub flat_works_min_years: u32,
    /// Depreciation deducted during ownership lowers the acquisition cost
    pub reintegrate_depreciation: bool,
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingTable {
    /// HCSF regulatory ceiling
    pub max_debt_ratio: Rate,
    /// Stricter ceiling under which the ratio is considered comfortable
    pub comfortable_debt_ratio: Rate,
    pub notary_fee_new: Rate,
    pub notary_fee_renovated: Rate,
}

// ---------------------------------------------------------------------------
// LMNP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MicroBicParameters {
    pub allowance_rate: Rate,
    pub receipts_ceiling: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationComponent {
    pub name: String,
    /// Share of the depreciable building value
    pub share: Rate,
    pub useful_life_years: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmnpTable {
    pub long_term: MicroBicParameters,
    pub classified_tourism: MicroBicParameters,
    pub unclassified_tourism: MicroBicParameters,
    pub minimum_allowance: Money,
    pub land_share: Rate,
    pub components: Vec<DepreciationComponent>,
    pub furniture_life_years: u32,
    /// Savings within this share of the larger one are reported as equivalent
    pub equivalence_margin: Rate,
}

// ---------------------------------------------------------------------------
// All tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxTables {
    pub tax_year: i32,
    pub income_tax: IncomeTaxTable,
    /// Social charges on property income
    pub social_charges_rate: Rate,
    pub jeanbrun: JeanbrunTable,
    pub rent_ceilings: RentCeilingTable,
    pub deficit_foncier: DeficitFoncierTable,
    pub capital_gains: CapitalGainsTable,
    pub financing: FinancingTable,
    pub lmnp: LmnpTable,
}

impl Default for TaxTables {
    fn default() -> Self {
        TaxTables::baseline_2026()
    }
}

fn bracket(lower: Money, upper: Option<Money>, rate: Rate) -> TaxBracket {
    TaxBracket { lower, upper, rate }
}

fn surtax_bracket(lower: Money, upper: Option<Money>, rate: Rate, smoothing: Option<Rate>) -> SurtaxBracket {
    SurtaxBracket {
        lower,
        upper,
        rate,
        smoothing,
    }
}

fn component(name: &str, share: Rate, useful_life_years: u32) -> DepreciationComponent {
    DepreciationComponent {
        name: name.to_string(),
        share,
        useful_life_years,
    }
}

impl TaxTables {
    /// Parameters applicable to simulations run in 2026.
    pub fn baseline_2026() -> Self {
        TaxTables {
            tax_year: 2026,
            income_tax: IncomeTaxTable {
                brackets: BracketTable {
                    brackets: vec![
                        bracket(dec!(0), Some(dec!(11_497)), dec!(0)),
                        bracket(dec!(11_497), Some(dec!(29_315)), dec!(0.11)),
                        bracket(dec!(29_315), Some(dec!(83_823)), dec!(0.30)),
                        bracket(dec!(83_823), Some(dec!(180_294)), dec!(0.41)),
                        bracket(dec!(180_294), None, dec!(0.45)),
                    ],
                },
                qf_cap_per_half_share: dec!(1_791),
                decote: DecoteTable {
                    single_base: dec!(889),
                    single_threshold: dec!(1_965),
                    couple_base: dec!(1_470),
                    couple_threshold: dec!(3_249),
                    factor: dec!(0.4525),
                },
            },
            social_charges_rate: dec!(0.172),
            jeanbrun: JeanbrunTable {
                base_ratio: dec!(0.80),
                engagement_years: 9,
                new_build: ByTier {
                    intermediate: TierParameters {
                        rate: dec!(0.035),
                        cap: dec!(8_000),
                    },
                    social: TierParameters {
                        rate: dec!(0.045),
                        cap: dec!(10_000),
                    },
                    very_social: TierParameters {
                        rate: dec!(0.055),
                        cap: dec!(12_000),
                    },
                },
                renovated_rates: ByTier {
                    intermediate: dec!(0.030),
                    social: dec!(0.035),
                    very_social: dec!(0.040),
                },
                renovated_cap: dec!(10_700),
                renovation_threshold: dec!(0.30),
            },
            rent_ceilings: RentCeilingTable {
                per_square_meter: ByZone {
                    a_bis: dec!(18.89),
                    a: dec!(14.03),
                    b1: dec!(11.31),
                    b2: dec!(9.83),
                    c: dec!(9.83),
                },
                surface_coefficient_base: dec!(0.7),
                surface_coefficient_numerator: dec!(19),
                surface_coefficient_max: dec!(1.2),
                tier_coefficients: ByTier {
                    intermediate: dec!(1.00),
                    social: dec!(0.80),
                    very_social: dec!(0.65),
                },
            },
            deficit_foncier: DeficitFoncierTable {
                standard_cap: dec!(10_700),
                bonified_cap: dec!(21_400),
                bonified_until: NaiveDate::from_ymd_opt(2027, 12, 31).unwrap_or_default(),
                carry_forward_years: 10,
            },
            capital_gains: CapitalGainsTable {
                income_tax_rate: dec!(0.19),
                social_rate: dec!(0.172),
                income_tax_abatement: vec![
                    AbatementStep {
                        first_year: 6,
                        last_year: 21,
                        annual_rate: dec!(0.06),
                    },
                    AbatementStep {
                        first_year: 22,
                        last_year: 22,
                        annual_rate: dec!(0.04),
                    },
                ],
                social_abatement: vec![
                    AbatementStep {
                        first_year: 6,
                        last_year: 21,
                        annual_rate: dec!(0.0165),
                    },
                    AbatementStep {
                        first_year: 22,
                        last_year: 22,
                        annual_rate: dec!(0.016),
                    },
                    AbatementStep {
                        first_year: 23,
                        last_year: 30,
                        annual_rate: dec!(0.09),
                    },
                ],
                surtax: vec![
                    surtax_bracket(dec!(50_000), Some(dec!(60_000)), dec!(0.02), Some(dec!(0.05))),
                    surtax_bracket(dec!(60_000), Some(dec!(100_000)), dec!(0.02), None),
                    surtax_bracket(dec!(100_000), Some(dec!(110_000)), dec!(0.03), Some(dec!(0.10))),
                    surtax_bracket(dec!(110_000), Some(dec!(150_000)), dec!(0.03), None),
                    surtax_bracket(dec!(150_000), Some(dec!(160_000)), dec!(0.04), Some(dec!(0.15))),
                    surtax_bracket(dec!(160_000), Some(dec!(200_000)), dec!(0.04), None),
                    surtax_bracket(dec!(200_000), Some(dec!(210_000)), dec!(0.05), Some(dec!(0.20))),
                    surtax_bracket(dec!(210_000), Some(dec!(250_000)), dec!(0.05), None),
                    surtax_bracket(dec!(250_000), Some(dec!(260_000)), dec!(0.06), Some(dec!(0.25))),
                    surtax_bracket(dec!(260_000), None, dec!(0.06), None),
                ],
                flat_acquisition_fee_rate: dec!(0.075),
                flat_works_rate: dec!(0.15),
                flat_works_min_years: 5,
                reintegrate_depreciation: true,
            },
            financing: FinancingTable {
                max_debt_ratio: dec!(0.35),
                comfortable_debt_ratio: dec!(0.33),
                notary_fee_new: dec!(0.025),
                notary_fee_renovated: dec!(0.075),
            },
            lmnp: LmnpTable {
                long_term: MicroBicParameters {
                    allowance_rate: dec!(0.50),
                    receipts_ceiling: dec!(77_700),
                },
                classified_tourism: MicroBicParameters {
                    allowance_rate: dec!(0.50),
                    receipts_ceiling: dec!(77_700),
                },
                unclassified_tourism: MicroBicParameters {
                    allowance_rate: dec!(0.30),
                    receipts_ceiling: dec!(15_000),
                },
                minimum_allowance: dec!(305),
                land_share: dec!(0.15),
                components: vec![
                    component("structure", dec!(0.40), 50),
                    component("roofing_facade", dec!(0.20), 25),
                    component("installations", dec!(0.20), 15),
                    component("fittings", dec!(0.20), 10),
                ],
                furniture_life_years: 7,
                equivalence_margin: dec!(0.05),
            },
        }
    }

    /// Check every table invariant the calculators rely on.
    pub fn validate(&self) -> EngineResult<()> {
        self.income_tax.brackets.validate("income_tax.brackets")?;

        let deficit = &self.deficit_foncier;
        if deficit.bonified_cap < deficit.standard_cap {
            return Err(EngineError::InvalidTable {
                table: "deficit_foncier".into(),
                reason: "Bonified cap cannot be lower than the standard cap".into(),
            });
        }
        if deficit.carry_forward_years == 0 {
            return Err(EngineError::InvalidTable {
                table: "deficit_foncier".into(),
                reason: "Carry-forward duration must be at least 1 year".into(),
            });
        }

        if self.jeanbrun.engagement_years == 0 {
            return Err(EngineError::InvalidTable {
                table: "jeanbrun".into(),
                reason: "Engagement duration must be at least 1 year".into(),
            });
        }

        validate_abatement("capital_gains.income_tax_abatement", &self.capital_gains.income_tax_abatement)?;
        validate_abatement("capital_gains.social_abatement", &self.capital_gains.social_abatement)?;
        for pair in self.capital_gains.surtax.windows(2) {
            if pair[1].lower < pair[0].lower {
                return Err(EngineError::InvalidTable {
                    table: "capital_gains.surtax".into(),
                    reason: "Surtax brackets must be ordered by lower bound".into(),
                });
            }
        }

        let share_total: Decimal = self.lmnp.components.iter().map(|c| c.share).sum();
        if share_total != Decimal::ONE {
            return Err(EngineError::InvalidTable {
                table: "lmnp.components".into(),
                reason: format!("Component shares must sum to 1, got {share_total}"),
            });
        }
        if self.lmnp.components.iter().any(|c| c.useful_life_years == 0) || self.lmnp.furniture_life_years == 0 {
            return Err(EngineError::InvalidTable {
                table: "lmnp.components".into(),
                reason: "Useful lives must be at least 1 year".into(),
            });
        }

        Ok(())
    }
}

fn validate_abatement(name: &str, steps: &[AbatementStep]) -> EngineResult<()> {
    let mut previous_last = 0;
    for step in steps {
        if step.first_year > step.last_year || step.first_year <= previous_last {
            return Err(EngineError::InvalidTable {
                table: name.to_string(),
                reason: "Abatement steps must be ordered and non-overlapping".into(),
            });
        }
        previous_last = step.last_year;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_tables_are_valid() {
        TaxTables::default().validate().unwrap();
    }

    #[test]
    fn test_locate_boundaries_belong_to_upper_bracket() {
        let tables = TaxTables::default();
        let brackets = &tables.income_tax.brackets;
        assert_eq!(brackets.locate(dec!(11_496.99)).unwrap().0, 0);
        assert_eq!(brackets.locate(dec!(11_497)).unwrap().0, 1);
        assert_eq!(brackets.locate(dec!(-5)).unwrap().0, 0);
        assert_eq!(brackets.locate(dec!(10_000_000)).unwrap().0, 4);
    }

    #[test]
    fn test_gap_between_brackets_is_rejected() {
        let result = BracketTable::new(vec![
            bracket(dec!(0), Some(dec!(10_000)), dec!(0)),
            bracket(dec!(12_000), None, dec!(0.1)),
        ]);
        assert!(matches!(result, Err(EngineError::InvalidTable { .. })));
    }

    #[test]
    fn test_decreasing_rates_are_rejected() {
        let result = BracketTable::new(vec![
            bracket(dec!(0), Some(dec!(10_000)), dec!(0.2)),
            bracket(dec!(10_000), None, dec!(0.1)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bounded_last_bracket_is_rejected() {
        let result = BracketTable::new(vec![bracket(dec!(0), Some(dec!(10_000)), dec!(0.2))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tables_roundtrip_through_json() {
        let tables = TaxTables::default();
        let json = serde_json::to_string(&tables).unwrap();
        let back: TaxTables = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tables);
    }

    #[test]
    fn test_overlapping_abatement_steps_are_rejected() {
        let mut tables = TaxTables::default();
        tables.capital_gains.social_abatement[1].first_year = 21;
        assert!(tables.validate().is_err());
    }
}
