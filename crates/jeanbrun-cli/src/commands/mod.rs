pub mod financing;
pub mod simulate;
pub mod tax;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use jeanbrun_core::jeanbrun::RentTier;
use jeanbrun_core::{with_metadata, TaxTables};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TierArg {
    Intermediate,
    Social,
    VerySocial,
}

impl From<TierArg> for RentTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Intermediate => RentTier::Intermediate,
            TierArg::Social => RentTier::Social,
            TierArg::VerySocial => RentTier::VerySocial,
        }
    }
}

/// Wrap a single calculator result in the standard envelope.
pub(crate) fn envelope<T: Serialize>(
    methodology: &str,
    input: &impl Serialize,
    tables: &TaxTables,
    start: Instant,
    result: T,
) -> Result<Value, Box<dyn std::error::Error>> {
    let output = with_metadata(
        methodology,
        input,
        Vec::new(),
        tables.tax_year,
        start.elapsed().as_micros() as u64,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
