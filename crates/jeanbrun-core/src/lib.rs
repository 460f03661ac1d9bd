pub mod capital_gains;
pub mod deficit_foncier;
pub mod error;
pub mod financing;
pub mod income_tax;
pub mod jeanbrun;
pub mod lmnp;
pub mod simulation;
pub mod tables;
pub mod time_value;
pub mod types;

pub use error::EngineError;
pub use simulation::{simulate, simulate_with_tables, SimulationInput, SimulationResult};
pub use tables::TaxTables;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
