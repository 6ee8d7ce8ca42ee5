//! Fama-French factor replication from portfolio sorts.
//!
//! Portfolios are formed once a year at the July sorting date and held for
//! the following twelve months. Each named factor is a fixed combination of
//! long-short legs drawn from one or more portfolio-return grids; the
//! combination rules live in [`FactorRecipe`] tables so they can be
//! inspected and validated against published reference series instead of
//! being buried in code.

use crate::breakpoints::BucketSpec;
use crate::error::{Result, SortError};
use crate::portfolio::{long_short, weighted_portfolio_returns};
use crate::sort::{SortConfig, SortEngine, SortMode, SortVariable};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sorting date governing a return month: July 1 of the current year for
/// July-December months, July 1 of the prior year for January-June.
pub fn sorting_date_for(month: NaiveDate) -> NaiveDate {
    let year = if month.month() <= 6 {
        month.year() - 1
    } else {
        month.year()
    };
    // July 1 always exists.
    NaiveDate::from_ymd_opt(year, 7, 1).unwrap_or(month)
}

/// Attach a `sorting_date` column derived from `month_col`.
pub fn with_sorting_dates(monthly: &DataFrame, month_col: &str) -> Result<DataFrame> {
    let months = monthly
        .column(month_col)
        .map_err(|_| SortError::MissingColumn(month_col.to_string()))?
        .date()?;
    let sorting_dates: Vec<Option<NaiveDate>> = months
        .as_date_iter()
        .map(|m| m.map(sorting_date_for))
        .collect();
    let mut out = monthly.clone();
    out.with_column(Series::new("sorting_date".into(), sorting_dates))?;
    Ok(out)
}

/// One long-short leg of a factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorLeg {
    /// Name of the portfolio-return grid the leg is computed from.
    pub grid: String,
    /// Label column within that grid to spread on.
    pub spread_on: String,
    /// Long the highest label when true, the lowest when false.
    pub long_high: bool,
}

/// A named factor as an equal-weight average of long-short legs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorRecipe {
    /// Factor name, which becomes the output column name.
    pub name: String,
    /// Legs averaged into the factor series.
    pub legs: Vec<FactorLeg>,
}

impl FactorRecipe {
    fn validate(&self, grids: &BTreeMap<String, DataFrame>) -> Result<()> {
        if self.legs.is_empty() {
            return Err(SortError::InvalidConfig(format!(
                "factor {} has no legs",
                self.name
            )));
        }
        for leg in &self.legs {
            if !grids.contains_key(&leg.grid) {
                return Err(SortError::InvalidConfig(format!(
                    "factor {} references unknown grid {}",
                    self.name, leg.grid
                )));
            }
        }
        Ok(())
    }
}

/// The classic three-factor combination table: SMB and HML both from the
/// size × book-to-market grid.
pub fn ff3_recipes() -> Vec<FactorRecipe> {
    vec![
        FactorRecipe {
            name: "smb".into(),
            legs: vec![FactorLeg {
                grid: "value".into(),
                spread_on: "portfolio_size".into(),
                long_high: false,
            }],
        },
        FactorRecipe {
            name: "hml".into(),
            legs: vec![FactorLeg {
                grid: "value".into(),
                spread_on: "portfolio_bm".into(),
                long_high: true,
            }],
        },
    ]
}

/// The five-factor combination table. SMB averages the small-minus-big legs
/// of all three auxiliary grids; CMA is conservative (low investment) minus
/// aggressive.
pub fn ff5_recipes() -> Vec<FactorRecipe> {
    let smb_leg = |grid: &str| FactorLeg {
        grid: grid.into(),
        spread_on: "portfolio_size".into(),
        long_high: false,
    };
    vec![
        FactorRecipe {
            name: "smb".into(),
            legs: vec![smb_leg("value"), smb_leg("profitability"), smb_leg("investment")],
        },
        FactorRecipe {
            name: "hml".into(),
            legs: vec![FactorLeg {
                grid: "value".into(),
                spread_on: "portfolio_bm".into(),
                long_high: true,
            }],
        },
        FactorRecipe {
            name: "rmw".into(),
            legs: vec![FactorLeg {
                grid: "profitability".into(),
                spread_on: "portfolio_op".into(),
                long_high: true,
            }],
        },
        FactorRecipe {
            name: "cma".into(),
            legs: vec![FactorLeg {
                grid: "investment".into(),
                spread_on: "portfolio_inv".into(),
                long_high: false,
            }],
        },
    ]
}

/// Combine portfolio-return grids into factor time series per the recipes.
///
/// Output: `{month, <factor name>...}`, inner-joined across factors so every
/// row has all series present.
pub fn compose_factors(
    grids: &BTreeMap<String, DataFrame>,
    recipes: &[FactorRecipe],
    period_col: &str,
    ret_col: &str,
) -> Result<DataFrame> {
    if recipes.is_empty() {
        return Err(SortError::InvalidConfig("no factor recipes given".into()));
    }
    let mut combined: Option<LazyFrame> = None;
    for recipe in recipes {
        recipe.validate(grids)?;
        let mut legs: Option<LazyFrame> = None;
        for (i, leg) in recipe.legs.iter().enumerate() {
            let series = long_short(
                &grids[&leg.grid],
                period_col,
                &leg.spread_on,
                ret_col,
                leg.long_high,
            )?
            .lazy()
            .select([col(period_col), col("premium").alias(format!("leg_{i}"))]);
            legs = Some(match legs {
                None => series,
                Some(acc) => acc.join(
                    series,
                    [col(period_col)],
                    [col(period_col)],
                    JoinArgs::new(JoinType::Inner),
                ),
            });
        }
        let n_legs = recipe.legs.len();
        let leg_sum = (0..n_legs)
            .map(|i| col(format!("leg_{i}")))
            .reduce(|a, b| a + b)
            .ok_or_else(|| SortError::InvalidConfig("no factor legs".into()))?;
        let factor = legs
            .ok_or_else(|| SortError::InvalidConfig("no factor legs".into()))?
            .with_column((leg_sum / lit(n_legs as f64)).alias(recipe.name.as_str()))
            .select([col(period_col), col(recipe.name.as_str())]);
        combined = Some(match combined {
            None => factor,
            Some(acc) => acc.join(
                factor,
                [col(period_col)],
                [col(period_col)],
                JoinArgs::new(JoinType::Inner),
            ),
        });
    }
    Ok(combined
        .ok_or_else(|| SortError::InvalidConfig("no factor recipes given".into()))?
        .sort([period_col], SortMultipleOptions::default())
        .collect()?)
}

/// Configuration shared by the factor replications.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Boolean column in the sorting-variables frame marking the reference
    /// subset for breakpoints (e.g. listing-venue membership). `None` uses
    /// the full cross-section.
    pub reference_col: Option<String>,
    /// Size axis layout.
    pub size_spec: BucketSpec,
    /// Characteristic axes layout.
    pub characteristic_spec: BucketSpec,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            reference_col: None,
            size_spec: BucketSpec::Count(2),
            characteristic_spec: BucketSpec::Quantiles(vec![0.3, 0.7]),
        }
    }
}

/// Replicate the three-factor SMB and HML series.
///
/// `sorting_variables` carries one row per entity and sorting date with
/// `entity_id`, `sorting_date`, `size`, `bm` (and the reference column if
/// configured); `monthly` carries `entity_id`, `month`, `ret_excess` and
/// `mktcap_lag`. Output: `{month, smb, hml}`.
pub fn replicate_ff3(
    sorting_variables: &DataFrame,
    monthly: &DataFrame,
    cfg: &ReplicationConfig,
) -> Result<DataFrame> {
    let engine = SortEngine::new(SortConfig {
        period_col: "sorting_date".into(),
        reference_col: cfg.reference_col.clone(),
    });
    let sorted = engine.double_sort(
        sorting_variables,
        &SortVariable::new("size", cfg.size_spec.clone()),
        &SortVariable::new("bm", cfg.characteristic_spec.clone()),
        SortMode::Independent,
    )?;
    let held = held_portfolios(monthly, &sorted.assignments)?;
    let value = weighted_portfolio_returns(
        &held,
        "month",
        &["portfolio_size", "portfolio_bm"],
        "ret_excess",
        Some("mktcap_lag"),
    )?;
    let grids = BTreeMap::from([("value".to_string(), value)]);
    compose_factors(&grids, &ff3_recipes(), "month", "ret_excess")
}

/// Replicate the five-factor SMB, HML, RMW and CMA series.
///
/// Sorts are dependent: two size buckets first, then terciles of `bm`, `op`
/// and `inv` within each size bucket. Output: `{month, smb, hml, rmw, cma}`.
pub fn replicate_ff5(
    sorting_variables: &DataFrame,
    monthly: &DataFrame,
    cfg: &ReplicationConfig,
) -> Result<DataFrame> {
    let engine = SortEngine::new(SortConfig {
        period_col: "sorting_date".into(),
        reference_col: cfg.reference_col.clone(),
    });
    let characteristic =
        |column: &str| SortVariable::new(column, cfg.characteristic_spec.clone());
    let sorted = engine.sort(
        sorting_variables,
        &SortVariable::new("size", cfg.size_spec.clone()),
        &[characteristic("bm"), characteristic("op"), characteristic("inv")],
        SortMode::Dependent,
    )?;
    let held = held_portfolios(monthly, &sorted.assignments)?;

    let mut grids = BTreeMap::new();
    for (grid, label) in [
        ("value", "portfolio_bm"),
        ("profitability", "portfolio_op"),
        ("investment", "portfolio_inv"),
    ] {
        grids.insert(
            grid.to_string(),
            weighted_portfolio_returns(
                &held,
                "month",
                &["portfolio_size", label],
                "ret_excess",
                Some("mktcap_lag"),
            )?,
        );
    }
    compose_factors(&grids, &ff5_recipes(), "month", "ret_excess")
}

/// Join monthly returns to their governing sorting date's assignments.
fn held_portfolios(monthly: &DataFrame, assignments: &DataFrame) -> Result<DataFrame> {
    for column in ["entity_id", "month", "ret_excess", "mktcap_lag"] {
        if !monthly.get_column_names().iter().any(|c| c.as_str() == column) {
            return Err(SortError::MissingColumn(column.to_string()));
        }
    }
    let dated = with_sorting_dates(monthly, "month")?;
    Ok(dated
        .lazy()
        .join(
            assignments.clone().lazy(),
            [col("entity_id"), col("sorting_date")],
            [col("entity_id"), col("sorting_date")],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?)
}
