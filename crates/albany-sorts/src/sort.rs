//! Per-period portfolio sorts over a cross-section.
//!
//! Every sort is stateless across periods: each period's cross-section gets
//! fresh breakpoints from its reference subset, and every entity with a
//! non-null sorting variable is classified against them. Double sorts come
//! in two modes, and the mode is an explicit parameter because it changes
//! which entities the secondary breakpoints are computed from.

use crate::breakpoints::{Breakpoints, BucketSpec};
use crate::error::{Result, SortError};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How secondary sort variables get their breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    /// Each variable's breakpoints come from the full period cross-section's
    /// reference subset, classified independently. The resulting grid may be
    /// unevenly populated.
    Independent,
    /// Secondary breakpoints are recomputed within each primary bucket, from
    /// that bucket's reference members. Balanced on the primary axis only.
    Dependent,
}

/// One sorting variable and its bucket layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortVariable {
    /// Column holding the sorting characteristic.
    pub column: String,
    /// Bucket layout for this variable.
    pub spec: BucketSpec,
}

impl SortVariable {
    /// Convenience constructor.
    pub fn new(column: impl Into<String>, spec: BucketSpec) -> Self {
        Self {
            column: column.into(),
            spec,
        }
    }

    /// Name of the label column this variable produces.
    pub fn label_column(&self) -> String {
        format!("portfolio_{}", self.column)
    }
}

/// Sort engine configuration.
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// Period column the cross-sections are grouped on.
    pub period_col: String,
    /// Optional boolean column marking the reference subset whose
    /// distribution defines breakpoints. `None` uses the full cross-section.
    pub reference_col: Option<String>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            period_col: "month".into(),
            reference_col: None,
        }
    }
}

/// Result of a sort: assignments plus what was omitted.
#[derive(Debug)]
pub struct SortOutput {
    /// One row per classified entity-period: `entity_id`, the period column,
    /// and one `portfolio_*` label column per sorting variable.
    pub assignments: DataFrame,
    /// Periods skipped because their reference subset was empty.
    pub skipped_periods: Vec<NaiveDate>,
    /// Rows omitted because a sorting value was not finite, or because a
    /// dependent secondary sort had no reference members inside their
    /// primary bucket.
    pub unassigned_rows: usize,
}

/// Assigns portfolio labels per period from breakpoint sorts.
#[derive(Debug, Clone, Default)]
pub struct SortEngine {
    config: SortConfig,
}

impl SortEngine {
    /// Create an engine over the given configuration.
    pub fn new(config: SortConfig) -> Self {
        Self { config }
    }

    /// Sort on a single variable.
    pub fn single_sort(&self, df: &DataFrame, var: &SortVariable) -> Result<SortOutput> {
        self.sort(df, var, &[], SortMode::Independent)
    }

    /// Sort on a primary and one secondary variable.
    pub fn double_sort(
        &self,
        df: &DataFrame,
        primary: &SortVariable,
        secondary: &SortVariable,
        mode: SortMode,
    ) -> Result<SortOutput> {
        self.sort(df, primary, std::slice::from_ref(secondary), mode)
    }

    /// Sort on a primary variable and any number of secondaries.
    ///
    /// Rows with a null or non-finite value in any sorting variable are
    /// omitted from the output, matching the no-default policy: an entity
    /// without a usable characteristic gets no label rather than a
    /// substituted one.
    pub fn sort(
        &self,
        df: &DataFrame,
        primary: &SortVariable,
        secondaries: &[SortVariable],
        mode: SortMode,
    ) -> Result<SortOutput> {
        primary.spec.validate()?;
        for var in secondaries {
            var.spec.validate()?;
        }
        let mut required = vec!["entity_id", self.config.period_col.as_str(), &primary.column];
        required.extend(secondaries.iter().map(|v| v.column.as_str()));
        if let Some(reference) = &self.config.reference_col {
            required.push(reference.as_str());
        }
        for column in &required {
            if !df.get_column_names().iter().any(|c| c.as_str() == *column) {
                return Err(SortError::MissingColumn((*column).to_string()));
            }
        }

        let mut keep = col(&primary.column).is_not_null().and(col(&self.config.period_col).is_not_null());
        for var in secondaries {
            keep = keep.and(col(&var.column).is_not_null());
        }
        let filtered = df.clone().lazy().filter(keep).collect()?;

        let mut out_parts: Vec<LazyFrame> = Vec::new();
        let mut skipped_periods = Vec::new();
        let mut unassigned_rows = 0usize;

        for part in filtered.partition_by([self.config.period_col.as_str()], true)? {
            let period = self.period_of(&part)?;
            let reference = self.reference_mask(&part)?;
            let primary_values = column_f64(&part, &primary.column)?;

            let primary_bp =
                match breakpoints_for(&primary_values, &reference, None, &primary.spec) {
                    Ok(bp) => bp,
                    Err(SortError::EmptyReference) => {
                        skipped_periods.push(period);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
            let primary_labels: Vec<Option<u32>> =
                primary_values.iter().map(|v| primary_bp.assign(*v)).collect();

            // Each row keeps its label on every axis, or is dropped entirely.
            let mut label_columns: Vec<(String, Vec<Option<u32>>)> =
                vec![(primary.label_column(), primary_labels.clone())];
            for var in secondaries {
                let values = column_f64(&part, &var.column)?;
                let labels = match mode {
                    SortMode::Independent => {
                        match breakpoints_for(&values, &reference, None, &var.spec) {
                            Ok(bp) => values.iter().map(|v| bp.assign(*v)).collect(),
                            Err(SortError::EmptyReference) => vec![None; values.len()],
                            Err(e) => return Err(e),
                        }
                    }
                    SortMode::Dependent => {
                        let mut labels = vec![None; values.len()];
                        for bucket in 1..=primary_bp.effective_buckets() as u32 {
                            let members: Vec<bool> =
                                primary_labels.iter().map(|l| *l == Some(bucket)).collect();
                            match breakpoints_for(&values, &reference, Some(&members), &var.spec) {
                                Ok(bp) => {
                                    for (i, value) in values.iter().enumerate() {
                                        if members[i] {
                                            labels[i] = bp.assign(*value);
                                        }
                                    }
                                }
                                Err(SortError::EmptyReference) => {}
                                Err(e) => return Err(e),
                            }
                        }
                        labels
                    }
                };
                label_columns.push((var.label_column(), labels));
            }

            let assigned: Vec<bool> = (0..part.height())
                .map(|i| label_columns.iter().all(|(_, labels)| labels[i].is_some()))
                .collect();
            unassigned_rows += assigned.iter().filter(|a| !**a).count();

            let entity_ids = part.column("entity_id")?.i64()?;
            let mut out_ids: Vec<i64> = Vec::new();
            let mut out_periods: Vec<NaiveDate> = Vec::new();
            for (i, keep_row) in assigned.iter().enumerate() {
                if *keep_row {
                    out_ids.push(entity_ids.get(i).ok_or_else(|| {
                        SortError::MissingColumn("entity_id".to_string())
                    })?);
                    out_periods.push(period);
                }
            }
            let mut columns: Vec<Column> = vec![
                Series::new("entity_id".into(), out_ids).into(),
                Series::new(self.config.period_col.as_str().into(), out_periods).into(),
            ];
            for (name, labels) in &label_columns {
                let kept: Vec<u32> = labels
                    .iter()
                    .zip(&assigned)
                    .filter(|(_, keep_row)| **keep_row)
                    .filter_map(|(l, _)| *l)
                    .collect();
                columns.push(Series::new(name.as_str().into(), kept).into());
            }
            out_parts.push(DataFrame::new(columns)?.lazy());
        }

        let assignments = if out_parts.is_empty() {
            self.empty_assignments(primary, secondaries)?
        } else {
            concat(out_parts, UnionArgs::default())?
                .sort(
                    [self.config.period_col.as_str(), "entity_id"],
                    SortMultipleOptions::default(),
                )
                .collect()?
        };
        skipped_periods.sort_unstable();

        Ok(SortOutput {
            assignments,
            skipped_periods,
            unassigned_rows,
        })
    }

    fn period_of(&self, part: &DataFrame) -> Result<NaiveDate> {
        part.column(self.config.period_col.as_str())?
            .date()?
            .as_date_iter()
            .next()
            .flatten()
            .ok_or_else(|| SortError::InvalidDtype {
                column: self.config.period_col.clone(),
                expected: "date".into(),
            })
    }

    fn reference_mask(&self, part: &DataFrame) -> Result<Vec<bool>> {
        match &self.config.reference_col {
            None => Ok(vec![true; part.height()]),
            Some(column) => Ok(part
                .column(column.as_str())?
                .bool()?
                .into_iter()
                .map(|flag| flag.unwrap_or(false))
                .collect()),
        }
    }

    fn empty_assignments(
        &self,
        primary: &SortVariable,
        secondaries: &[SortVariable],
    ) -> Result<DataFrame> {
        let mut columns: Vec<Column> = vec![
            Series::new("entity_id".into(), Vec::<i64>::new()).into(),
            Series::new(
                self.config.period_col.as_str().into(),
                Vec::<NaiveDate>::new(),
            )
            .into(),
            Series::new(primary.label_column().into(), Vec::<u32>::new()).into(),
        ];
        for var in secondaries {
            columns.push(Series::new(var.label_column().into(), Vec::<u32>::new()).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}

fn column_f64(part: &DataFrame, column: &str) -> Result<Vec<f64>> {
    Ok(part
        .column(column)?
        .f64()
        .map_err(|_| SortError::InvalidDtype {
            column: column.to_string(),
            expected: "f64".into(),
        })?
        .into_no_null_iter()
        .collect())
}

/// Breakpoints from the values where `reference` (and `members`, when given)
/// holds.
fn breakpoints_for(
    values: &[f64],
    reference: &[bool],
    members: Option<&[bool]>,
    spec: &BucketSpec,
) -> Result<Breakpoints> {
    let selected: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, _)| reference[*i] && members.is_none_or(|m| m[*i]))
        .map(|(_, v)| *v)
        .collect();
    Breakpoints::from_reference(&selected, spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, 1).unwrap()
    }

    fn cross_section(a: &[f64], b: &[f64]) -> DataFrame {
        let n = a.len();
        DataFrame::new(vec![
            Series::new("entity_id".into(), (1..=n as i64).collect::<Vec<_>>()).into(),
            Series::new("month".into(), vec![month(1); n]).into(),
            Series::new("a".into(), a.to_vec()).into(),
            Series::new("b".into(), b.to_vec()).into(),
        ])
        .unwrap()
    }

    fn labels(df: &DataFrame, column: &str) -> Vec<u32> {
        df.column(column).unwrap().u32().unwrap().into_no_null_iter().collect()
    }

    #[test]
    fn independent_two_by_two_grid() {
        // A ascending, B descending: the corners must land opposite.
        let df = cross_section(&[1.0, 2.0, 3.0, 4.0], &[4.0, 3.0, 2.0, 1.0]);
        let engine = SortEngine::default();
        let out = engine
            .double_sort(
                &df,
                &SortVariable::new("a", BucketSpec::Count(2)),
                &SortVariable::new("b", BucketSpec::Count(2)),
                SortMode::Independent,
            )
            .unwrap();
        let a = labels(&out.assignments, "portfolio_a");
        let b = labels(&out.assignments, "portfolio_b");
        assert_eq!(a, vec![1, 1, 2, 2]);
        assert_eq!(b, vec![2, 2, 1, 1]);
        assert!(out.skipped_periods.is_empty());
    }

    #[test]
    fn dependent_sort_recomputes_secondary_within_buckets() {
        // B rises with A, so an independent sort would label B as
        // [1, 1, 2, 2]. A dependent sort re-splits B inside each A-bucket.
        let df = cross_section(&[1.0, 2.0, 10.0, 20.0], &[1.0, 2.0, 3.0, 4.0]);
        let engine = SortEngine::default();
        let out = engine
            .double_sort(
                &df,
                &SortVariable::new("a", BucketSpec::Count(2)),
                &SortVariable::new("b", BucketSpec::Count(2)),
                SortMode::Dependent,
            )
            .unwrap();
        assert_eq!(labels(&out.assignments, "portfolio_a"), vec![1, 1, 2, 2]);
        assert_eq!(labels(&out.assignments, "portfolio_b"), vec![1, 2, 1, 2]);
    }

    #[test]
    fn reference_subset_defines_cuts_but_everyone_is_classified() {
        // Only entities 1-2 are in the reference subset; the cut is their
        // midpoint, so the huge outsiders all land in the top bucket.
        let df = DataFrame::new(vec![
            Series::new("entity_id".into(), vec![1i64, 2, 3, 4]).into(),
            Series::new("month".into(), vec![month(1); 4]).into(),
            Series::new("a".into(), vec![1.0, 3.0, 100.0, 200.0]).into(),
            Series::new("liquid".into(), vec![true, true, false, false]).into(),
        ])
        .unwrap();
        let engine = SortEngine::new(SortConfig {
            period_col: "month".into(),
            reference_col: Some("liquid".into()),
        });
        let out = engine
            .single_sort(&df, &SortVariable::new("a", BucketSpec::Count(2)))
            .unwrap();
        assert_eq!(labels(&out.assignments, "portfolio_a"), vec![1, 2, 2, 2]);
    }

    #[test]
    fn null_characteristics_are_omitted_not_defaulted() {
        let df = DataFrame::new(vec![
            Series::new("entity_id".into(), vec![1i64, 2, 3]).into(),
            Series::new("month".into(), vec![month(1); 3]).into(),
            Series::new("a".into(), vec![Some(1.0), None, Some(3.0)]).into(),
        ])
        .unwrap();
        let out = SortEngine::default()
            .single_sort(&df, &SortVariable::new("a", BucketSpec::Count(2)))
            .unwrap();
        let ids: Vec<i64> = out
            .assignments
            .column("entity_id")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn nan_characteristics_are_omitted_not_defaulted() {
        // A NaN slips past the null filter; it must not land in bucket 1.
        let df = DataFrame::new(vec![
            Series::new("entity_id".into(), vec![1i64, 2, 3]).into(),
            Series::new("month".into(), vec![month(1); 3]).into(),
            Series::new("a".into(), vec![1.0, f64::NAN, 3.0]).into(),
        ])
        .unwrap();
        let out = SortEngine::default()
            .single_sort(&df, &SortVariable::new("a", BucketSpec::Count(2)))
            .unwrap();
        let ids: Vec<i64> = out
            .assignments
            .column("entity_id")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(out.unassigned_rows, 1);
    }

    #[test]
    fn empty_reference_subset_skips_the_period() {
        let df = DataFrame::new(vec![
            Series::new("entity_id".into(), vec![1i64, 2]).into(),
            Series::new("month".into(), vec![month(1); 2]).into(),
            Series::new("a".into(), vec![1.0, 2.0]).into(),
            Series::new("liquid".into(), vec![false, false]).into(),
        ])
        .unwrap();
        let engine = SortEngine::new(SortConfig {
            period_col: "month".into(),
            reference_col: Some("liquid".into()),
        });
        let out = engine
            .single_sort(&df, &SortVariable::new("a", BucketSpec::Count(2)))
            .unwrap();
        assert_eq!(out.assignments.height(), 0);
        assert_eq!(out.skipped_periods, vec![month(1)]);
    }

    #[test]
    fn periods_are_sorted_independently() {
        // The same value can land in different buckets in different months
        // because each month's cross-section defines its own cuts.
        let df = DataFrame::new(vec![
            Series::new("entity_id".into(), vec![1i64, 2, 1, 2]).into(),
            Series::new(
                "month".into(),
                vec![month(1), month(1), month(2), month(2)],
            )
            .into(),
            Series::new("a".into(), vec![5.0, 10.0, 5.0, 1.0]).into(),
        ])
        .unwrap();
        let out = SortEngine::default()
            .single_sort(&df, &SortVariable::new("a", BucketSpec::Count(2)))
            .unwrap();
        assert_eq!(labels(&out.assignments, "portfolio_a"), vec![1, 2, 2, 1]);
    }

    #[test]
    fn missing_column_is_rejected() {
        let df = cross_section(&[1.0], &[1.0]);
        let err = SortEngine::default()
            .single_sort(&df, &SortVariable::new("zz", BucketSpec::Count(2)))
            .unwrap_err();
        assert!(matches!(err, SortError::MissingColumn(c) if c == "zz"));
    }
}
