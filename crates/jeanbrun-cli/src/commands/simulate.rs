use clap::Args;
use serde_json::Value;

use jeanbrun_core::{simulate_with_tables, SimulationInput, TaxTables};

use crate::input;

/// Arguments for the full simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON simulation input (household, property, financing, ...)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_simulate(args: SimulateArgs, tables: &TaxTables) -> Result<Value, Box<dyn std::error::Error>> {
    let simulation: SimulationInput = input::require_input(args.input.as_deref(), "simulate")?;
    let result = simulate_with_tables(&simulation, tables)?;
    Ok(serde_json::to_value(result)?)
}
