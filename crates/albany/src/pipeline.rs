//! End-to-end beta estimation pipeline.
//!
//! Wires the panel completer to the batched rolling estimator: sparse
//! returns are densified against the factor series' period universe, then
//! betas are estimated batch by batch with results accumulated for the
//! caller.

use albany_beta::{BatchConfig, BatchOutcome, BatchRunner, RollingCapmConfig, RunStats};
use albany_panel::{PanelConfig, complete_panel};
use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;

/// Errors from the combined pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Panel completion failed.
    #[error(transparent)]
    Panel(#[from] albany_panel::PanelError),

    /// Beta estimation failed.
    #[error(transparent)]
    Beta(#[from] albany_beta::BetaError),

    /// Underlying polars error.
    #[error("polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

/// Result type for the combined pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Configuration for the beta pipeline.
#[derive(Debug, Clone, Default)]
pub struct BetaPipelineConfig {
    /// Panel completion parameters.
    pub panel: PanelConfig,
    /// Rolling estimation parameters.
    pub rolling: RollingCapmConfig,
    /// Batch execution parameters.
    pub batch: BatchConfig,
}

/// Output of a full beta pipeline run.
#[derive(Debug)]
pub struct BetaPipelineOutput {
    /// All beta records: `entity_id`, period column, `beta`.
    pub betas: DataFrame,
    /// Accumulated per-unit outcome counts.
    pub stats: RunStats,
    /// Period coverage of the output, when any records exist.
    pub period_range: Option<(NaiveDate, NaiveDate)>,
}

/// Densify sparse returns against the factor series and estimate rolling
/// betas over the whole universe.
///
/// `returns` carries `entity_id`, the period column and `ret_excess`;
/// `factor` carries the period column and `mkt_excess`. `on_batch` is
/// invoked after each batch completes, before its memory is released.
pub fn run_beta_pipeline(
    returns: &DataFrame,
    factor: &DataFrame,
    period_col: &str,
    cfg: &BetaPipelineConfig,
    mut on_batch: impl FnMut(&BatchOutcome),
) -> Result<BetaPipelineOutput> {
    let panel = complete_panel(returns, factor, period_col, &cfg.panel)?;
    let runner = BatchRunner::new(cfg.batch.clone(), cfg.rolling.clone())?;

    let mut frames: Vec<LazyFrame> = Vec::new();
    let stats = runner.run(&panel, period_col, |outcome| {
        on_batch(&outcome);
        frames.push(outcome.betas.lazy());
        Ok(())
    })?;

    let out_col = if cfg.batch.monthly_output {
        "month"
    } else {
        period_col
    };
    let betas = if frames.is_empty() {
        DataFrame::new(vec![
            Series::new("entity_id".into(), Vec::<i64>::new()).into(),
            Series::new(out_col.into(), Vec::<NaiveDate>::new()).into(),
            Series::new("beta".into(), Vec::<f64>::new()).into(),
        ])?
    } else {
        concat(frames, UnionArgs::default())?
            .sort([out_col, "entity_id"], SortMultipleOptions::default())
            .collect()?
    };

    let period_range = if betas.height() > 0 {
        let periods = betas.column(out_col)?.date()?;
        let mut dates = periods.as_date_iter().flatten();
        let first = dates.next();
        let last = dates.last().or(first);
        first.zip(last)
    } else {
        None
    };

    Ok(BetaPipelineOutput {
        betas,
        stats,
        period_range,
    })
}
