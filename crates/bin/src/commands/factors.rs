//! The `factors` subcommand: Fama-French style factor replication.

use crate::io::read_csv;
use albany_output::write_frame_csv;
use albany_sorts::{ReplicationConfig, replicate_ff3, replicate_ff5};
use std::path::Path;

/// Which factor model to replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum FactorModel {
    /// Three factors: SMB and HML from an independent 2×3 sort.
    Ff3,
    /// Five factors: SMB, HML, RMW and CMA from dependent sorts.
    Ff5,
}

pub(crate) struct FactorsParams<'a> {
    pub model: FactorModel,
    pub sorting_variables: &'a Path,
    pub monthly: &'a Path,
    pub reference_col: Option<&'a str>,
    pub output: &'a Path,
}

pub(crate) fn run(params: &FactorsParams<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let sorting_variables = read_csv(params.sorting_variables)?;
    let monthly = read_csv(params.monthly)?;

    let cfg = ReplicationConfig {
        reference_col: params.reference_col.map(str::to_string),
        ..Default::default()
    };
    let mut factors = match params.model {
        FactorModel::Ff3 => replicate_ff3(&sorting_variables, &monthly, &cfg)?,
        FactorModel::Ff5 => replicate_ff5(&sorting_variables, &monthly, &cfg)?,
    };

    write_frame_csv(&mut factors, params.output)?;
    println!("{} factor months", factors.height());
    println!("{}", factors.head(Some(5)));
    println!("wrote {}", params.output.display());

    Ok(())
}
