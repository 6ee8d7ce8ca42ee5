//! The `sort` subcommand: portfolio sorts and spread returns over a CSV
//! characteristic panel.

use crate::io::read_csv;
use albany_output::{SortSummary, write_frame_csv};
use albany_sorts::{
    SortConfig, SortEngine, SortMode, SortVariable, long_short, weighted_portfolio_returns,
};
use polars::prelude::*;
use std::path::Path;

pub(crate) struct SortParams<'a> {
    pub data: &'a Path,
    pub by: SortVariable,
    pub then: Option<SortVariable>,
    pub mode: SortMode,
    pub period_col: &'a str,
    pub reference_col: Option<&'a str>,
    pub ret_col: Option<&'a str>,
    pub weight_col: Option<&'a str>,
    pub output_dir: &'a Path,
    pub json: bool,
}

pub(crate) fn run(params: &SortParams<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_csv(params.data)?;
    std::fs::create_dir_all(params.output_dir)?;

    let engine = SortEngine::new(SortConfig {
        period_col: params.period_col.to_string(),
        reference_col: params.reference_col.map(str::to_string),
    });
    let out = match &params.then {
        None => engine.single_sort(&data, &params.by)?,
        Some(secondary) => engine.double_sort(&data, &params.by, secondary, params.mode)?,
    };

    let mut assignments = out.assignments.clone();
    let assignments_path = params.output_dir.join("assignments.csv");
    write_frame_csv(&mut assignments, &assignments_path)?;

    // Portfolio returns need the sorted rows joined back to their returns.
    if let Some(ret_col) = params.ret_col {
        let mut label_cols = vec![params.by.label_column()];
        label_cols.extend(params.then.iter().map(SortVariable::label_column));
        let labels: Vec<&str> = label_cols.iter().map(String::as_str).collect();

        let with_labels = data
            .clone()
            .lazy()
            .join(
                out.assignments.clone().lazy(),
                [col("entity_id"), col(params.period_col)],
                [col("entity_id"), col(params.period_col)],
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        let mut portfolio_returns = weighted_portfolio_returns(
            &with_labels,
            params.period_col,
            &labels,
            ret_col,
            params.weight_col,
        )?;
        write_frame_csv(
            &mut portfolio_returns,
            &params.output_dir.join("portfolio_returns.csv"),
        )?;

        // Spread on the last sort axis, long the top bucket.
        let spread_col = labels.last().copied().unwrap_or_default();
        let mut premium =
            long_short(&portfolio_returns, params.period_col, spread_col, ret_col, true)?;
        write_frame_csv(&mut premium, &params.output_dir.join("premium.csv"))?;
    }

    let summary = SortSummary {
        task: "sort".to_string(),
        assigned_rows: out.assignments.height(),
        unassigned_rows: out.unassigned_rows,
        skipped_periods: out.skipped_periods,
    };
    if params.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
        println!("wrote {}", params.output_dir.display());
    }

    Ok(())
}
