//! Last-observation-carried-forward with a staleness limit.
//!
//! Characteristic panels (book equity, operating profitability, ...) update
//! at most annually while the return panel is monthly. The domain rule is to
//! carry the latest known value forward per entity, but only for a bounded
//! number of periods: a stale characteristic must drop out of the sort
//! rather than linger forever.

use crate::error::Result;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Carry the latest non-null value of each column in `value_cols` forward
/// within each entity, ordered by `period_col`, dropping values once they
/// are older than `max_age_months` months.
///
/// Operates on ordered copies of each entity's records; the input frame is
/// never mutated. Rows whose carried value would be stale get a null.
pub fn fill_forward_within(
    df: &DataFrame,
    period_col: &str,
    value_cols: &[&str],
    max_age_months: u32,
) -> Result<DataFrame> {
    let parts = df.partition_by(["entity_id"], true)?;

    let mut filled_parts: Vec<LazyFrame> = Vec::with_capacity(parts.len());
    for part in parts {
        let mut part = part.sort([period_col], SortMultipleOptions::default())?;
        let periods: Vec<Option<NaiveDate>> = part
            .column(period_col)?
            .date()?
            .as_date_iter()
            .collect();

        for &name in value_cols {
            let values: Vec<Option<f64>> = part.column(name)?.f64()?.into_iter().collect();
            let filled = carry_forward(&periods, &values, max_age_months);
            part.with_column(Series::new(name.into(), filled))?;
        }
        filled_parts.push(part.lazy());
    }

    let out = concat(filled_parts, UnionArgs::default())?
        .sort(["entity_id", period_col], SortMultipleOptions::default())
        .collect()?;
    Ok(out)
}

fn carry_forward(
    periods: &[Option<NaiveDate>],
    values: &[Option<f64>],
    max_age_months: u32,
) -> Vec<Option<f64>> {
    let mut last: Option<(NaiveDate, f64)> = None;
    periods
        .iter()
        .zip(values)
        .map(|(period, value)| {
            let Some(period) = period else { return None };
            if let Some(v) = value {
                last = Some((*period, *v));
                return Some(*v);
            }
            match last {
                Some((asof, v)) if months_between(asof, *period) <= max_age_months as i32 => {
                    Some(v)
                }
                _ => None,
            }
        })
        .collect()
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + (to.month() as i32 - from.month() as i32)
}
