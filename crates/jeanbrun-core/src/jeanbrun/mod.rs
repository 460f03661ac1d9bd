//! Jeanbrun depreciation scheme: new-build and renovated variants, plus the
//! rent ceilings attached to each rent tier.

pub mod new_build;
pub mod renovated;
pub mod rent_ceiling;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

pub use new_build::{calculate_new_build, NewBuildResult};
pub use renovated::{calculate_renovated, required_renovation, RenovatedOutcome};
pub use rent_ceiling::{monthly_rent_ceiling, RentCeiling};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Newly built (Jeanbrun neuf)
    New,
    /// Existing property with qualifying works (Jeanbrun ancien)
    Renovated,
}

/// Rent tier the owner commits to. Each tier fixes a depreciation rate, a
/// cap (new build only), and a rent ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentTier {
    Intermediate,
    Social,
    VerySocial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalZone {
    ABis,
    A,
    B1,
    B2,
    C,
}

/// Result of whichever Jeanbrun variant applies to the property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property_type", rename_all = "snake_case")]
pub enum JeanbrunOutcome {
    New(NewBuildResult),
    Renovated(RenovatedOutcome),
}

impl JeanbrunOutcome {
    /// Amortization deductible each year; zero for an ineligible renovation.
    pub fn annual_amortization(&self) -> Money {
        match self {
            JeanbrunOutcome::New(r) => r.net_amortization,
            JeanbrunOutcome::Renovated(RenovatedOutcome::Eligible(r)) => r.net_amortization,
            JeanbrunOutcome::Renovated(RenovatedOutcome::Ineligible(_)) => Decimal::ZERO,
        }
    }

    pub fn is_eligible(&self) -> bool {
        !matches!(
            self,
            JeanbrunOutcome::Renovated(RenovatedOutcome::Ineligible(_))
        )
    }
}
