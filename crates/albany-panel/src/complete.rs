//! Densification of sparse return observations.
//!
//! Rolling estimation needs implicit gaps made explicit: an entity that is
//! missing a month must contribute a null-return row for that month, not a
//! shorter history. `complete_panel` expands each entity to a dense grid over
//! its observed lifetime, clipped to the global period universe, and joins
//! the per-period factor columns on top.

use crate::error::{PanelError, Result};
use chrono::NaiveDate;
use polars::prelude::*;

/// Configuration for panel completion.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Minimum number of raw observations an entity needs to be kept.
    /// Entities below the threshold are dropped before densification.
    pub min_observations: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { min_observations: 1 }
    }
}

/// Compute each entity's observed lifespan and observation count.
///
/// Returns a frame with columns `entity_id`, `first_period`, `last_period`
/// and `n_obs`. Entities with zero observations simply do not appear.
pub fn entity_lifespans(returns: &DataFrame, period_col: &str) -> Result<DataFrame> {
    require_column(returns, "entity_id")?;
    require_column(returns, period_col)?;

    let spans = returns
        .clone()
        .lazy()
        .filter(col(period_col).is_not_null())
        .group_by([col("entity_id")])
        .agg([
            col(period_col).min().alias("first_period"),
            col(period_col).max().alias("last_period"),
            col(period_col)
                .count()
                .cast(DataType::Int64)
                .alias("n_obs"),
        ])
        .collect()?;

    Ok(spans)
}

/// Expand sparse observations to a dense entity×period panel.
///
/// For every surviving entity the output contains exactly one row per period
/// in `[first_period, last_period] ∩ period universe`, where the universe is
/// the set of periods present in `factor`. The return column (and any other
/// per-observation column carried on `returns`) is left-joined, so missing
/// observations show up as nulls. Per-period columns on `factor` are
/// left-joined on the period alone.
///
/// Pure function: neither input is modified.
pub fn complete_panel(
    returns: &DataFrame,
    factor: &DataFrame,
    period_col: &str,
    cfg: &PanelConfig,
) -> Result<DataFrame> {
    require_column(factor, period_col)?;

    let universe = period_universe(factor, period_col)?;
    if universe.is_empty() {
        return Err(PanelError::EmptyPeriodUniverse);
    }

    let spans = entity_lifespans(returns, period_col)?
        .lazy()
        .filter(col("n_obs").gt_eq(lit(cfg.min_observations as i64)))
        .collect()?;

    let ids = spans.column("entity_id")?.i64()?;
    let firsts = spans.column("first_period")?.date()?;
    let lasts = spans.column("last_period")?.date()?;

    let mut grid_ids: Vec<i64> = Vec::new();
    let mut grid_periods: Vec<NaiveDate> = Vec::new();
    for ((id, first), last) in ids
        .into_iter()
        .zip(firsts.as_date_iter())
        .zip(lasts.as_date_iter())
    {
        let (Some(id), Some(first), Some(last)) = (id, first, last) else {
            continue;
        };
        let lo = universe.partition_point(|p| *p < first);
        let hi = universe.partition_point(|p| *p <= last);
        for period in &universe[lo..hi] {
            grid_ids.push(id);
            grid_periods.push(*period);
        }
    }

    let grid = DataFrame::new(vec![
        Series::new("entity_id".into(), grid_ids).into(),
        Series::new(period_col.into(), grid_periods).into(),
    ])?;

    let panel = grid
        .lazy()
        .join(
            returns.clone().lazy(),
            [col("entity_id"), col(period_col)],
            [col("entity_id"), col(period_col)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            factor.clone().lazy(),
            [col(period_col)],
            [col(period_col)],
            JoinArgs::new(JoinType::Left),
        )
        .sort(["entity_id", period_col], SortMultipleOptions::default())
        .collect()?;

    Ok(panel)
}

/// Sorted, deduplicated periods present in the factor frame.
fn period_universe(factor: &DataFrame, period_col: &str) -> Result<Vec<NaiveDate>> {
    let dates = factor
        .column(period_col)?
        .date()
        .map_err(|_| PanelError::InvalidDtype {
            column: period_col.to_string(),
            expected: "Date".to_string(),
        })?;
    let mut universe: Vec<NaiveDate> = dates.as_date_iter().flatten().collect();
    universe.sort_unstable();
    universe.dedup();
    Ok(universe)
}

fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        Ok(())
    } else {
        Err(PanelError::MissingColumn(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn factor_frame(months: &[NaiveDate]) -> DataFrame {
        let mkt: Vec<f64> = (0..months.len()).map(|i| 0.01 + i as f64 * 0.001).collect();
        DataFrame::new(vec![
            Series::new("month".into(), months.to_vec()).into(),
            Series::new("mkt_excess".into(), mkt).into(),
        ])
        .unwrap()
    }

    fn returns_frame(rows: &[(i64, NaiveDate, f64)]) -> DataFrame {
        DataFrame::new(vec![
            Series::new("entity_id".into(), rows.iter().map(|r| r.0).collect::<Vec<_>>()).into(),
            Series::new("month".into(), rows.iter().map(|r| r.1).collect::<Vec<_>>()).into(),
            Series::new("ret_excess".into(), rows.iter().map(|r| r.2).collect::<Vec<_>>()).into(),
        ])
        .unwrap()
    }

    #[test]
    fn gaps_become_explicit_nulls() {
        let months: Vec<NaiveDate> = (1..=5).map(|m| month(2020, m)).collect();
        let factor = factor_frame(&months);
        // Entity 10 observed in months 1, 2 and 4: month 3 is an interior gap.
        let returns = returns_frame(&[
            (10, month(2020, 1), 0.01),
            (10, month(2020, 2), 0.02),
            (10, month(2020, 4), 0.03),
        ]);

        let panel = complete_panel(&returns, &factor, "month", &PanelConfig::default()).unwrap();
        assert_eq!(panel.height(), 4); // months 1-4, nothing past the lifespan

        let rets = panel.column("ret_excess").unwrap().f64().unwrap();
        assert_eq!(rets.get(0), Some(0.01));
        assert_eq!(rets.get(1), Some(0.02));
        assert_eq!(rets.get(2), None); // the gap
        assert_eq!(rets.get(3), Some(0.03));

        // Factor column joined on every grid row, including the gap.
        let mkt = panel.column("mkt_excess").unwrap().f64().unwrap();
        assert!(mkt.into_iter().all(|v| v.is_some()));
    }

    #[test]
    fn lifespan_bounds_are_respected() {
        let months: Vec<NaiveDate> = (1..=6).map(|m| month(2021, m)).collect();
        let factor = factor_frame(&months);
        let returns = returns_frame(&[(7, month(2021, 2), 0.01), (7, month(2021, 5), 0.02)]);

        let panel = complete_panel(&returns, &factor, "month", &PanelConfig::default()).unwrap();
        let periods: Vec<NaiveDate> = panel
            .column("month")
            .unwrap()
            .date()
            .unwrap()
            .as_date_iter()
            .flatten()
            .collect();
        assert_eq!(
            periods,
            vec![month(2021, 2), month(2021, 3), month(2021, 4), month(2021, 5)]
        );
    }

    #[test]
    fn sparse_entities_are_excluded() {
        let months: Vec<NaiveDate> = (1..=4).map(|m| month(2020, m)).collect();
        let factor = factor_frame(&months);
        let returns = returns_frame(&[
            (1, month(2020, 1), 0.01),
            (1, month(2020, 2), 0.02),
            (1, month(2020, 3), 0.03),
            (2, month(2020, 1), 0.05),
        ]);

        let cfg = PanelConfig { min_observations: 2 };
        let panel = complete_panel(&returns, &factor, "month", &cfg).unwrap();
        let ids = panel.column("entity_id").unwrap().i64().unwrap();
        assert!(ids.into_iter().flatten().all(|id| id == 1));
    }

    #[test]
    fn empty_universe_is_an_error() {
        let factor = factor_frame(&[]);
        let returns = returns_frame(&[(1, month(2020, 1), 0.01)]);
        let err = complete_panel(&returns, &factor, "month", &PanelConfig::default());
        assert!(matches!(err, Err(PanelError::EmptyPeriodUniverse)));
    }

    #[test]
    fn lifespans_count_observations() {
        let returns = returns_frame(&[
            (3, month(2020, 1), 0.01),
            (3, month(2020, 4), 0.02),
            (9, month(2020, 2), 0.00),
        ]);
        let spans = entity_lifespans(&returns, "month").unwrap();
        assert_eq!(spans.height(), 2);

        let spans = spans
            .lazy()
            .sort(["entity_id"], SortMultipleOptions::default())
            .collect()
            .unwrap();
        let n_obs = spans.column("n_obs").unwrap().i64().unwrap();
        assert_eq!(n_obs.get(0), Some(2));
        assert_eq!(n_obs.get(1), Some(1));
    }
}
