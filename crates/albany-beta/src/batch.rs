//! Batched, parallel execution over a large entity universe.
//!
//! Pulling a whole cross-section of daily histories into memory at once is
//! what blows up runs, so the universe is processed in bounded-size batches:
//! each batch's panel slice is materialized, fanned out per entity on a
//! fixed-size thread pool, and the batch's results are handed to the caller
//! before the next batch starts. Entity failures are isolated and counted,
//! never fatal to the batch.

use crate::error::{BetaError, Result};
use crate::rolling::{EntitySeries, RollingCapmConfig, estimate_entity};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Batch execution configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of entities materialized per batch.
    pub batch_size: usize,
    /// Worker threads in the estimation pool.
    pub workers: usize,
    /// Downsample finer-grained input to one estimate per calendar month,
    /// keeping the last valid window per month. Set this when the period
    /// column is daily.
    pub monthly_output: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            workers: default_workers(),
            monthly_output: false,
        }
    }
}

/// Available parallelism minus one, leaving a core for the caller.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Counts of per-unit outcomes accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Entities that produced at least one beta record.
    pub entities_ok: usize,
    /// Entities that produced no records (insufficient data everywhere).
    pub entities_skipped: usize,
    /// Entities whose estimation failed outright.
    pub entities_failed: usize,
    /// Windows with a degenerate (zero-variance) fit.
    pub windows_failed: usize,
    /// Total beta records emitted.
    pub beta_records: usize,
    /// Batches processed.
    pub batches: usize,
}

impl RunStats {
    fn absorb(&mut self, other: &Self) {
        self.entities_ok += other.entities_ok;
        self.entities_skipped += other.entities_skipped;
        self.entities_failed += other.entities_failed;
        self.windows_failed += other.windows_failed;
        self.beta_records += other.beta_records;
        self.batches += other.batches;
    }
}

/// One batch's output, yielded to the caller's sink before the next batch
/// begins.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Zero-based batch index.
    pub batch_index: usize,
    /// Total number of batches in the run.
    pub n_batches: usize,
    /// Beta records of this batch: `entity_id`, period column, `beta`.
    pub betas: DataFrame,
    /// Per-unit outcome counts for this batch alone.
    pub stats: RunStats,
}

/// Runs rolling beta estimation over an entity universe in batches.
#[derive(Debug)]
pub struct BatchRunner {
    batch: BatchConfig,
    rolling: RollingCapmConfig,
    pool: rayon::ThreadPool,
}

impl BatchRunner {
    /// Create a runner, validating all parameters eagerly.
    pub fn new(batch: BatchConfig, rolling: RollingCapmConfig) -> Result<Self> {
        rolling.validate()?;
        if batch.batch_size == 0 {
            return Err(BetaError::InvalidConfig("batch_size must be positive".into()));
        }
        if batch.workers == 0 {
            return Err(BetaError::InvalidConfig("workers must be positive".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(batch.workers)
            .build()
            .map_err(|e| BetaError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            batch,
            rolling,
            pool,
        })
    }

    /// Run over a dense panel held in memory.
    ///
    /// `panel` must carry `entity_id`, the period column, `ret_excess` and
    /// `mkt_excess`. With `monthly_output` set, the period column's label
    /// in the output frame is `month`.
    pub fn run(
        &self,
        panel: &DataFrame,
        period_col: &str,
        sink: impl FnMut(BatchOutcome) -> Result<()>,
    ) -> Result<RunStats> {
        for required in ["entity_id", period_col, "ret_excess", "mkt_excess"] {
            if !panel.get_column_names().iter().any(|c| c.as_str() == required) {
                return Err(BetaError::MissingColumn(required.to_string()));
            }
        }

        let mut ids: Vec<i64> = panel
            .column("entity_id")?
            .i64()?
            .into_iter()
            .flatten()
            .collect();
        ids.sort_unstable();
        ids.dedup();

        self.run_with_loader(
            &ids,
            |batch_ids| {
                // Batches are contiguous chunks of the sorted universe, so a
                // range filter selects exactly the batch members.
                let (first, last) = (batch_ids[0], batch_ids[batch_ids.len() - 1]);
                let slice = panel
                    .clone()
                    .lazy()
                    .filter(
                        col("entity_id")
                            .gt_eq(lit(first))
                            .and(col("entity_id").lt_eq(lit(last))),
                    )
                    .collect()?;
                Ok(slice)
            },
            period_col,
            sink,
        )
    }

    /// Run over batches fetched by `loader`, which receives each batch's
    /// entity ids and returns that batch's dense panel slice. This is the
    /// entry point when the panel lives behind a store that should only be
    /// queried a bounded number of entities at a time.
    pub fn run_with_loader(
        &self,
        universe: &[i64],
        loader: impl Fn(&[i64]) -> Result<DataFrame>,
        period_col: &str,
        mut sink: impl FnMut(BatchOutcome) -> Result<()>,
    ) -> Result<RunStats> {
        let n_batches = universe.len().div_ceil(self.batch.batch_size).max(1);
        let mut total = RunStats::default();

        for (batch_index, batch_ids) in universe.chunks(self.batch.batch_size).enumerate() {
            let slice = loader(batch_ids)?;
            let parts = slice.partition_by(["entity_id"], true)?;

            let monthly = self.batch.monthly_output;
            let results: Vec<Result<crate::rolling::EntityEstimate>> = self.pool.install(|| {
                parts
                    .par_iter()
                    .map(|part| {
                        entity_series(part, period_col, monthly)
                            .and_then(|series| estimate_entity(&series, &self.rolling))
                    })
                    .collect()
            });

            let mut stats = RunStats {
                batches: 1,
                ..Default::default()
            };
            let mut out_ids: Vec<i64> = Vec::new();
            let mut out_periods: Vec<NaiveDate> = Vec::new();
            let mut out_betas: Vec<f64> = Vec::new();
            for result in results {
                match result {
                    Ok(estimate) => {
                        stats.windows_failed += estimate.failures.len();
                        if estimate.betas.is_empty() {
                            stats.entities_skipped += 1;
                        } else {
                            stats.entities_ok += 1;
                            stats.beta_records += estimate.betas.len();
                            for b in estimate.betas {
                                out_ids.push(b.entity_id);
                                out_periods.push(b.period);
                                out_betas.push(b.beta);
                            }
                        }
                    }
                    Err(_) => stats.entities_failed += 1,
                }
            }

            let out_col = if self.batch.monthly_output {
                "month"
            } else {
                period_col
            };
            let betas = DataFrame::new(vec![
                Series::new("entity_id".into(), out_ids).into(),
                Series::new(out_col.into(), out_periods).into(),
                Series::new("beta".into(), out_betas).into(),
            ])?;

            total.absorb(&stats);
            sink(BatchOutcome {
                batch_index,
                n_batches,
                betas,
                stats,
            })?;
        }

        Ok(total)
    }
}

/// Extract one entity's ordered series from its panel partition.
fn entity_series(part: &DataFrame, period_col: &str, monthly_output: bool) -> Result<EntitySeries> {
    let part = part
        .clone()
        .lazy()
        .sort([period_col], SortMultipleOptions::default())
        .collect()?;

    let entity_id = part
        .column("entity_id")?
        .i64()?
        .get(0)
        .ok_or_else(|| BetaError::MissingColumn("entity_id".to_string()))?;

    let period_iter = part.column(period_col)?.date()?.as_date_iter();
    let dependent = part.column("ret_excess")?.f64()?;
    let factor = part.column("mkt_excess")?.f64()?;

    let mut series = EntitySeries {
        entity_id,
        periods: Vec::with_capacity(part.height()),
        output_periods: monthly_output.then(|| Vec::with_capacity(part.height())),
        dependent: Vec::with_capacity(part.height()),
        factor: Vec::with_capacity(part.height()),
    };

    for (i, period) in period_iter.enumerate() {
        let Some(period) = period else { continue };
        series.periods.push(period);
        series.dependent.push(dependent.get(i));
        series.factor.push(factor.get(i));
        if let Some(out) = series.output_periods.as_mut() {
            out.push(period.with_day(1).unwrap_or(period));
        }
    }

    Ok(series)
}
