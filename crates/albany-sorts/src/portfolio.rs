//! Portfolio return aggregation and long-short spreads.

use crate::error::{Result, SortError};
use polars::prelude::*;

/// Value-weighted mean return per portfolio cell and period.
///
/// Rows with a null return or null weight are excluded from both the
/// numerator and the denominator, never treated as zero-weight. Cells whose
/// usable weight sums to zero are omitted from the output. Pass `None` for
/// `weight_col` to equal-weight.
pub fn weighted_portfolio_returns(
    df: &DataFrame,
    period_col: &str,
    label_cols: &[&str],
    ret_col: &str,
    weight_col: Option<&str>,
) -> Result<DataFrame> {
    let mut required = vec![period_col, ret_col];
    required.extend_from_slice(label_cols);
    required.extend(weight_col);
    for column in &required {
        if !df.get_column_names().iter().any(|c| c.as_str() == *column) {
            return Err(SortError::MissingColumn((*column).to_string()));
        }
    }

    let mut keys = vec![col(period_col)];
    keys.extend(label_cols.iter().map(|c| col(*c)));

    let aggregated = match weight_col {
        Some(weight) => {
            let usable = col(ret_col).is_not_null().and(col(weight).is_not_null());
            df.clone()
                .lazy()
                .group_by(keys)
                .agg([
                    (col(ret_col) * col(weight)).filter(usable.clone()).sum().alias("weighted_sum"),
                    col(weight).filter(usable).sum().alias("weight_sum"),
                ])
                .filter(col("weight_sum").gt(lit(0.0)))
                .with_column((col("weighted_sum") / col("weight_sum")).alias(ret_col))
                .drop(["weighted_sum", "weight_sum"])
        }
        None => df
            .clone()
            .lazy()
            .group_by(keys)
            .agg([col(ret_col).mean()])
            .filter(col(ret_col).is_not_null()),
    };

    let mut sort_cols = vec![period_col];
    sort_cols.extend_from_slice(label_cols);
    Ok(aggregated
        .sort(sort_cols, SortMultipleOptions::default())
        .collect()?)
}

/// Per-period spread between the extreme buckets of `label_col`.
///
/// `long_high` picks the direction: the return of the highest label minus
/// the lowest when true, the reverse when false. When several cells share
/// the extreme label (e.g. across a second sort axis) their returns are
/// averaged equally, which is how multi-leg factor recipes expect their
/// legs to be built. Output: `{period, premium}`.
pub fn long_short(
    df: &DataFrame,
    period_col: &str,
    label_col: &str,
    ret_col: &str,
    long_high: bool,
) -> Result<DataFrame> {
    for column in [period_col, label_col, ret_col] {
        if !df.get_column_names().iter().any(|c| c.as_str() == column) {
            return Err(SortError::MissingColumn(column.to_string()));
        }
    }

    let high = col(ret_col)
        .filter(col(label_col).eq(col(label_col).max()))
        .mean();
    let low = col(ret_col)
        .filter(col(label_col).eq(col(label_col).min()))
        .mean();
    let premium = if long_high { high - low } else { low - high };

    Ok(df
        .clone()
        .lazy()
        .group_by([col(period_col)])
        .agg([premium.alias("premium")])
        .sort([period_col], SortMultipleOptions::default())
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, 1).unwrap()
    }

    fn single_value(df: &DataFrame, column: &str) -> f64 {
        df.column(column).unwrap().f64().unwrap().get(0).unwrap()
    }

    #[test]
    fn weighted_mean_matches_hand_computation() {
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 3]).into(),
            Series::new("portfolio".into(), vec![1u32; 3]).into(),
            Series::new("ret_excess".into(), vec![0.1, 0.2, 0.3]).into(),
            Series::new("mktcap_lag".into(), vec![Some(1.0), Some(3.0), None]).into(),
        ])
        .unwrap();
        let out = weighted_portfolio_returns(
            &df,
            "month",
            &["portfolio"],
            "ret_excess",
            Some("mktcap_lag"),
        )
        .unwrap();
        // Null-weight entity excluded from numerator and denominator.
        assert_eq!(out.height(), 1);
        assert_relative_eq!(
            single_value(&out, "ret_excess"),
            (0.1 + 0.2 * 3.0) / 4.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn equal_weighting_without_a_weight_column() {
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 2]).into(),
            Series::new("portfolio".into(), vec![1u32; 2]).into(),
            Series::new("ret_excess".into(), vec![0.1, 0.3]).into(),
        ])
        .unwrap();
        let out =
            weighted_portfolio_returns(&df, "month", &["portfolio"], "ret_excess", None).unwrap();
        assert_relative_eq!(single_value(&out, "ret_excess"), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn cells_with_no_usable_weight_are_omitted() {
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 2]).into(),
            Series::new("portfolio".into(), vec![1u32, 2]).into(),
            Series::new("ret_excess".into(), vec![0.1, 0.2]).into(),
            Series::new("mktcap_lag".into(), vec![None, Some(2.0)]).into(),
        ])
        .unwrap();
        let out = weighted_portfolio_returns(
            &df,
            "month",
            &["portfolio"],
            "ret_excess",
            Some("mktcap_lag"),
        )
        .unwrap();
        let labels: Vec<u32> = out
            .column("portfolio")
            .unwrap()
            .u32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(labels, vec![2]);
    }

    #[test]
    fn grouping_spans_both_sort_axes() {
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 4]).into(),
            Series::new("portfolio_size".into(), vec![1u32, 1, 2, 2]).into(),
            Series::new("portfolio_bm".into(), vec![1u32, 2, 1, 2]).into(),
            Series::new("ret_excess".into(), vec![0.01, 0.02, 0.03, 0.04]).into(),
        ])
        .unwrap();
        let out = weighted_portfolio_returns(
            &df,
            "month",
            &["portfolio_size", "portfolio_bm"],
            "ret_excess",
            None,
        )
        .unwrap();
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn spread_is_high_minus_low_per_period() {
        let df = DataFrame::new(vec![
            Series::new(
                "month".into(),
                vec![month(1), month(1), month(2), month(2)],
            )
            .into(),
            Series::new("portfolio".into(), vec![1u32, 3, 1, 3]).into(),
            Series::new("ret_excess".into(), vec![0.01, 0.04, 0.02, 0.01]).into(),
        ])
        .unwrap();
        let out = long_short(&df, "month", "portfolio", "ret_excess", true).unwrap();
        let premia: Vec<f64> = out
            .column("premium")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_relative_eq!(premia[0], 0.03, epsilon = 1e-12);
        assert_relative_eq!(premia[1], -0.01, epsilon = 1e-12);
    }

    #[test]
    fn long_low_flips_the_sign() {
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 2]).into(),
            Series::new("portfolio".into(), vec![1u32, 2]).into(),
            Series::new("ret_excess".into(), vec![0.02, 0.01]).into(),
        ])
        .unwrap();
        let out = long_short(&df, "month", "portfolio", "ret_excess", false).unwrap();
        assert_relative_eq!(single_value(&out, "premium"), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn extreme_cells_are_averaged_across_the_other_axis() {
        // Two cells share each extreme size label; the spread averages them.
        let df = DataFrame::new(vec![
            Series::new("month".into(), vec![month(1); 4]).into(),
            Series::new("portfolio_size".into(), vec![1u32, 1, 2, 2]).into(),
            Series::new("ret_excess".into(), vec![0.02, 0.04, 0.01, 0.01]).into(),
        ])
        .unwrap();
        let out = long_short(&df, "month", "portfolio_size", "ret_excess", false).unwrap();
        assert_relative_eq!(single_value(&out, "premium"), 0.02, epsilon = 1e-12);
    }
}
