mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use jeanbrun_core::TaxTables;

use commands::financing::{BorrowingCapacityArgs, DebtRatioArgs, LoanArgs};
use commands::simulate::SimulateArgs;
use commands::tax::{
    CapitalGainsArgs, DeficitFoncierArgs, IncomeTaxArgs, JeanbrunNewArgs, JeanbrunRenovatedArgs, LmnpArgs,
};

/// Loi Jeanbrun rental investment simulations
#[derive(Parser)]
#[command(
    name = "jeanbrun",
    version,
    about = "Loi Jeanbrun rental investment simulations",
    long_about = "A CLI for simulating Loi Jeanbrun rental investments with decimal precision. \
                  Computes income tax and TMI, Jeanbrun amortization for new and renovated \
                  property, deficit foncier, loan schedules, capital gains on resale, and \
                  the LMNP furnished-rental alternative."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Alternate tax tables (JSON or YAML)
    #[arg(long, global = true)]
    tables: Option<String>,

    /// Log computation stages to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full simulation over the rental commitment
    Simulate(SimulateArgs),
    /// Income tax, quotient familial and marginal rate
    IncomeTax(IncomeTaxArgs),
    /// Jeanbrun amortization for a newly built property
    JeanbrunNew(JeanbrunNewArgs),
    /// Eligibility and Jeanbrun amortization for a renovated property
    JeanbrunRenovated(JeanbrunRenovatedArgs),
    /// Split a property deficit and project its carry-forward
    DeficitFoncier(DeficitFoncierArgs),
    /// Loan payment and amortization schedule
    Loan(LoanArgs),
    /// Maximum loan under the debt-ratio ceiling
    BorrowingCapacity(BorrowingCapacityArgs),
    /// Evaluate a household's debt ratio
    DebtRatio(DebtRatioArgs),
    /// Tax on the resale of a rental property
    CapitalGains(CapitalGainsArgs),
    /// Micro-BIC and itemized furnished-rental regimes
    Lmnp(LmnpArgs),
    /// Print the tax tables in use
    Tables,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn load_tables(path: Option<&str>) -> Result<TaxTables, Box<dyn std::error::Error>> {
    let tables = match path {
        Some(path) => input::file::read_tables(path)?,
        None => TaxTables::default(),
    };
    tables.validate()?;
    tracing::debug!(tax_year = tables.tax_year, custom = path.is_some(), "tax tables loaded");
    Ok(tables)
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: {}", "warning".yellow().bold(), e);
    }

    if let Commands::Version = cli.command {
        println!("jeanbrun {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let tables = match load_tables(cli.tables.as_deref()) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate(args) => commands::simulate::run_simulate(args, &tables),
        Commands::IncomeTax(args) => commands::tax::run_income_tax(args, &tables),
        Commands::JeanbrunNew(args) => commands::tax::run_jeanbrun_new(args, &tables),
        Commands::JeanbrunRenovated(args) => commands::tax::run_jeanbrun_renovated(args, &tables),
        Commands::DeficitFoncier(args) => commands::tax::run_deficit_foncier(args, &tables),
        Commands::Loan(args) => commands::financing::run_loan(args, &tables),
        Commands::BorrowingCapacity(args) => commands::financing::run_borrowing_capacity(args, &tables),
        Commands::DebtRatio(args) => commands::financing::run_debt_ratio(args, &tables),
        Commands::CapitalGains(args) => commands::tax::run_capital_gains(args, &tables),
        Commands::Lmnp(args) => commands::tax::run_lmnp(args, &tables),
        Commands::Tables => serde_json::to_value(&tables).map_err(Into::into),
        Commands::Version => return,
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
