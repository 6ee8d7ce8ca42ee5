//! Per-entity rolling-window beta estimation.
//!
//! Mirrors a rolling OLS with `missing = "drop"` semantics: every window end
//! gets a fit over the non-null pairs in its trailing window, windows with
//! fewer than `min_obs` pairs emit nothing at all, and a constant regressor
//! is reported as a failed window rather than a coefficient.

use crate::capm::ols_slope;
use crate::error::{BetaError, Result};
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Rolling estimation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingCapmConfig {
    /// Window length in periods.
    pub window: usize,
    /// Minimum number of non-null (dependent, factor) pairs a window needs.
    pub min_obs: usize,
}

impl Default for RollingCapmConfig {
    fn default() -> Self {
        // Five years of monthly data, at least four years observed.
        Self {
            window: 60,
            min_obs: 48,
        }
    }
}

impl RollingCapmConfig {
    /// Reject invalid parameters before any computation starts.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(BetaError::InvalidConfig("window must be positive".into()));
        }
        if self.min_obs < 2 {
            return Err(BetaError::InvalidConfig(
                "min_obs must be at least 2 (a slope needs two paired observations)".into(),
            ));
        }
        if self.min_obs > self.window {
            return Err(BetaError::InvalidConfig(format!(
                "min_obs ({}) exceeds window length ({})",
                self.min_obs, self.window
            )));
        }
        Ok(())
    }
}

/// One beta estimate for one entity at one period.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaObservation {
    /// Entity identifier.
    pub entity_id: i64,
    /// Window-end period the estimate is indexed at.
    pub period: NaiveDate,
    /// Estimated slope coefficient.
    pub beta: f64,
}

/// A window that had enough observations but an undefined fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFailure {
    /// Entity identifier.
    pub entity_id: i64,
    /// Window-end period of the failed fit.
    pub period: NaiveDate,
}

/// Output of estimating a single entity.
#[derive(Debug, Clone, Default)]
pub struct EntityEstimate {
    /// Chronologically ordered beta records.
    pub betas: Vec<BetaObservation>,
    /// Windows whose fit was degenerate.
    pub failures: Vec<WindowFailure>,
}

/// One entity's dense observation series.
///
/// `periods` is the native resolution of the data (months, or days for the
/// daily estimator). When `output_periods` is set it gives the coarser label
/// for each row, and only the last valid estimate per output period is kept
/// in the final series.
#[derive(Debug, Clone)]
pub struct EntitySeries {
    /// Entity identifier.
    pub entity_id: i64,
    /// Native-resolution periods.
    pub periods: Vec<NaiveDate>,
    /// Optional coarser output label per row.
    pub output_periods: Option<Vec<NaiveDate>>,
    /// Excess return per period; null where unobserved.
    pub dependent: Vec<Option<f64>>,
    /// Market excess return per period; null where unobserved.
    pub factor: Vec<Option<f64>>,
}

/// Estimate the rolling beta series for one entity.
///
/// Emits one record per window end `t` whose trailing `window` rows contain
/// at least `min_obs` non-null pairs; a window uses only data at or before
/// `t`, never ahead of it. Degenerate windows are collected as failures and
/// do not stop the remaining windows from estimating.
pub fn estimate_entity(series: &EntitySeries, cfg: &RollingCapmConfig) -> Result<EntityEstimate> {
    cfg.validate()?;

    let n = series.periods.len();
    if series.dependent.len() != n || series.factor.len() != n {
        return Err(BetaError::MismatchedLengths {
            periods: n,
            dependent: series.dependent.len(),
            factor: series.factor.len(),
        });
    }
    if let Some(out) = &series.output_periods
        && out.len() != n
    {
        return Err(BetaError::MismatchedLengths {
            periods: n,
            dependent: out.len(),
            factor: series.factor.len(),
        });
    }

    // Window arithmetic assumes chronological order; tolerate callers that
    // hand over unsorted slices.
    let order = sort_order(&series.periods);

    let mut estimate = EntityEstimate::default();
    if n < cfg.window {
        return Ok(estimate);
    }

    let mut xs: Vec<f64> = Vec::with_capacity(cfg.window);
    let mut ys: Vec<f64> = Vec::with_capacity(cfg.window);
    for t in (cfg.window - 1)..n {
        xs.clear();
        ys.clear();
        for &i in &order[t + 1 - cfg.window..=t] {
            if let (Some(y), Some(x)) = (series.dependent[i], series.factor[i]) {
                xs.push(x);
                ys.push(y);
            }
        }
        if xs.len() < cfg.min_obs {
            continue;
        }

        let end = order[t];
        let period = series.periods[end];
        match ols_slope(
            &Array1::from_vec(xs.clone()),
            &Array1::from_vec(ys.clone()),
        ) {
            Ok(beta) => {
                let label = series
                    .output_periods
                    .as_ref()
                    .map_or(period, |out| out[end]);
                push_downsampled(&mut estimate.betas, BetaObservation {
                    entity_id: series.entity_id,
                    period: label,
                    beta,
                });
            }
            Err(BetaError::DegenerateWindow) => estimate.failures.push(WindowFailure {
                entity_id: series.entity_id,
                period,
            }),
            Err(e) => return Err(e),
        }
    }

    Ok(estimate)
}

/// Keep only the last estimate per output label. Labels arrive in
/// chronological order, so a repeated label replaces the previous record.
fn push_downsampled(betas: &mut Vec<BetaObservation>, record: BetaObservation) {
    match betas.last_mut() {
        Some(last) if last.period == record.period => *last = record,
        _ => betas.push(record),
    }
}

fn sort_order(periods: &[NaiveDate]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..periods.len()).collect();
    if !periods.is_sorted() {
        order.sort_by_key(|&i| periods[i]);
    }
    order
}
