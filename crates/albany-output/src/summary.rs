//! Run summaries for pipeline executions.
//!
//! A run never fails silently on a per-unit basis: skipped entities,
//! failed windows and skipped sort periods are counted and reported next
//! to the successful output.

use albany_beta::RunStats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary of one beta estimation run.
///
/// # Examples
///
/// ```
/// use albany_beta::RunStats;
/// use albany_output::RunSummary;
/// use chrono::NaiveDate;
///
/// let stats = RunStats {
///     entities_ok: 480,
///     entities_skipped: 15,
///     entities_failed: 0,
///     windows_failed: 3,
///     beta_records: 52_000,
///     batches: 1,
/// };
/// let summary = RunSummary::new("betas".to_string(), stats)
///     .with_period(
///         NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
///         NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
///     );
/// assert!(summary.to_string().contains("480"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Name of the pipeline task.
    pub task: String,

    /// First period covered by the output, if any output exists.
    pub period_start: Option<NaiveDate>,

    /// Last period covered by the output.
    pub period_end: Option<NaiveDate>,

    /// Per-unit outcome counts.
    pub stats: RunStats,
}

impl RunSummary {
    /// Create a summary for a named task.
    pub fn new(task: String, stats: RunStats) -> Self {
        Self {
            task,
            period_start: None,
            period_end: None,
            stats,
        }
    }

    /// Attach the output's period coverage.
    #[must_use]
    pub const fn with_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.period_start = Some(start);
        self.period_end = Some(end);
        self
    }

    /// Total entities touched by the run.
    pub const fn entities_total(&self) -> usize {
        self.stats.entities_ok + self.stats.entities_skipped + self.stats.entities_failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} run summary ===", self.task)?;
        if let (Some(start), Some(end)) = (self.period_start, self.period_end) {
            writeln!(f, "period:           {start} .. {end}")?;
        }
        writeln!(f, "batches:          {}", self.stats.batches)?;
        writeln!(
            f,
            "entities:         {} ok / {} skipped / {} failed",
            self.stats.entities_ok, self.stats.entities_skipped, self.stats.entities_failed
        )?;
        writeln!(f, "degenerate windows: {}", self.stats.windows_failed)?;
        write!(f, "records:          {}", self.stats.beta_records)
    }
}

/// Summary of one portfolio sort run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSummary {
    /// Name of the pipeline task.
    pub task: String,

    /// Classified entity-period rows.
    pub assigned_rows: usize,

    /// Rows omitted because no assignment was possible.
    pub unassigned_rows: usize,

    /// Periods skipped for lack of reference observations.
    pub skipped_periods: Vec<NaiveDate>,
}

impl fmt::Display for SortSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} run summary ===", self.task)?;
        writeln!(f, "assigned rows:    {}", self.assigned_rows)?;
        writeln!(f, "unassigned rows:  {}", self.unassigned_rows)?;
        write!(f, "skipped periods:  {}", self.skipped_periods.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RunStats {
        RunStats {
            entities_ok: 3,
            entities_skipped: 1,
            entities_failed: 1,
            windows_failed: 2,
            beta_records: 42,
            batches: 2,
        }
    }

    #[test]
    fn test_entities_total() {
        let summary = RunSummary::new("betas".to_string(), stats());
        assert_eq!(summary.entities_total(), 5);
    }

    #[test]
    fn test_display_reports_all_counts() {
        let summary = RunSummary::new("betas".to_string(), stats()).with_period(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 1).unwrap(),
        );
        let text = summary.to_string();
        assert!(text.contains("3 ok / 1 skipped / 1 failed"));
        assert!(text.contains("2020-01-01 .. 2020-12-01"));
        assert!(text.contains("42"));
    }

    #[test]
    fn test_summary_round_trips_through_json() {
        let summary = RunSummary::new("betas".to_string(), stats());
        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(summary, back);
    }

    #[test]
    fn test_sort_summary_display() {
        let summary = SortSummary {
            task: "sort".to_string(),
            assigned_rows: 100,
            unassigned_rows: 4,
            skipped_periods: vec![NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()],
        };
        let text = summary.to_string();
        assert!(text.contains("100"));
        assert!(text.contains("skipped periods:  1"));
    }
}
