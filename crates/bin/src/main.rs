//! Albany CLI binary.
//!
//! Command-line interface over the Albany asset-pricing pipeline: rolling
//! beta estimation, portfolio sorts, and factor replication from CSV
//! inputs.

mod commands;
mod io;

use clap::{Parser, Subcommand, ValueEnum};
use commands::betas::BetasParams;
use commands::factors::{FactorModel, FactorsParams};
use commands::sort::SortParams;
use io::parse_sort_variable;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "albany")]
#[command(about = "Albany: rolling betas and portfolio sorts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortModeArg {
    /// Breakpoints for each variable from the full cross-section
    Independent,
    /// Secondary breakpoints recomputed within each primary bucket
    Dependent,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate rolling CAPM betas over an entity universe
    Betas {
        /// CSV with entity_id, period and ret_excess columns
        returns: PathBuf,

        /// CSV with period and mkt_excess columns
        factor: PathBuf,

        /// Period column name
        #[arg(long, default_value = "month")]
        period_col: String,

        /// Treat the period column as daily and emit one beta per month
        #[arg(long)]
        daily: bool,

        /// Rolling window length in periods
        #[arg(long, default_value = "60")]
        window: usize,

        /// Minimum valid observations per window
        #[arg(long, default_value = "48")]
        min_obs: usize,

        /// Minimum raw observations for an entity to enter estimation
        /// (default: window + 1)
        #[arg(long)]
        min_observations: Option<usize>,

        /// Entities per batch
        #[arg(long, default_value = "500")]
        batch_size: usize,

        /// Worker threads (default: available parallelism minus one)
        #[arg(long)]
        workers: Option<usize>,

        /// Output CSV path
        #[arg(long, short, default_value = "betas.csv")]
        output: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sort a characteristic panel into portfolios
    Sort {
        /// CSV with entity_id, the period column and characteristics
        data: PathBuf,

        /// Primary sort variable as column:buckets (e.g. size:2 or bm:0.3,0.7)
        #[arg(long)]
        by: String,

        /// Secondary sort variable for a double sort
        #[arg(long)]
        then: Option<String>,

        /// How the secondary variable gets its breakpoints
        #[arg(long, value_enum, default_value_t = SortModeArg::Independent)]
        mode: SortModeArg,

        /// Period column name
        #[arg(long, default_value = "month")]
        period_col: String,

        /// Boolean column marking the breakpoint reference subset
        #[arg(long)]
        reference_col: Option<String>,

        /// Return column; enables portfolio returns and the spread series
        #[arg(long)]
        ret_col: Option<String>,

        /// Weight column for value weighting (equal weights if omitted)
        #[arg(long)]
        weight_col: Option<String>,

        /// Output directory
        #[arg(long, short, default_value = "sorted")]
        output_dir: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replicate Fama-French factor series
    Factors {
        /// Factor model to replicate
        #[arg(long, value_enum, default_value_t = FactorModel::Ff3)]
        model: FactorModel,

        /// CSV with entity_id, sorting_date and the sorting characteristics
        sorting_variables: PathBuf,

        /// CSV with entity_id, month, ret_excess and mktcap_lag
        monthly: PathBuf,

        /// Boolean column marking the breakpoint reference subset
        #[arg(long)]
        reference_col: Option<String>,

        /// Output CSV path
        #[arg(long, short, default_value = "factors.csv")]
        output: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Betas {
            returns,
            factor,
            period_col,
            daily,
            window,
            min_obs,
            min_observations,
            batch_size,
            workers,
            output,
            json,
        } => commands::betas::run(&BetasParams {
            returns: &returns,
            factor: &factor,
            period_col: &period_col,
            daily,
            window,
            min_obs,
            min_observations,
            batch_size,
            workers,
            output: &output,
            json,
        }),
        Commands::Sort {
            data,
            by,
            then,
            mode,
            period_col,
            reference_col,
            ret_col,
            weight_col,
            output_dir,
            json,
        } => commands::sort::run(&SortParams {
            data: &data,
            by: parse_sort_variable(&by)?,
            then: then.as_deref().map(parse_sort_variable).transpose()?,
            mode: match mode {
                SortModeArg::Independent => albany_sorts::SortMode::Independent,
                SortModeArg::Dependent => albany_sorts::SortMode::Dependent,
            },
            period_col: &period_col,
            reference_col: reference_col.as_deref(),
            ret_col: ret_col.as_deref(),
            weight_col: weight_col.as_deref(),
            output_dir: &output_dir,
            json,
        }),
        Commands::Factors {
            model,
            sorting_variables,
            monthly,
            reference_col,
            output,
        } => commands::factors::run(&FactorsParams {
            model,
            sorting_variables: &sorting_variables,
            monthly: &monthly,
            reference_col: reference_col.as_deref(),
            output: &output,
        }),
    }
}
