//! Cross-sectional breakpoints and bucket assignment.
//!
//! Breakpoints are interior quantile cuts of a sorting variable, computed
//! from a reference subset of the cross-section and then applied to the
//! whole cross-section. End cuts are implicit ±∞ sentinels, so no entity
//! falls outside the observed sample range. Buckets are left-closed and
//! right-open, with the topmost bucket closed at +∞.

use crate::error::{Result, SortError};
use serde::{Deserialize, Serialize};

/// How to place the interior cuts of a sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BucketSpec {
    /// `n` buckets from equally spaced quantiles (`n − 1` interior cuts).
    Count(usize),
    /// Explicit interior quantile locations, each strictly inside (0, 1).
    /// `vec![0.3, 0.7]` gives the classic 30/70 tercile split.
    Quantiles(Vec<f64>),
}

impl BucketSpec {
    /// Validate the spec before any computation.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Count(n) if *n < 2 => Err(SortError::InvalidConfig(format!(
                "bucket count must be at least 2, got {n}"
            ))),
            Self::Count(_) => Ok(()),
            Self::Quantiles(qs) => {
                if qs.is_empty() {
                    return Err(SortError::InvalidConfig(
                        "quantile list must not be empty".into(),
                    ));
                }
                if qs.iter().any(|q| !(*q > 0.0 && *q < 1.0)) {
                    return Err(SortError::InvalidConfig(
                        "quantiles must lie strictly inside (0, 1)".into(),
                    ));
                }
                if qs.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(SortError::InvalidConfig(
                        "quantiles must be strictly increasing".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Target bucket count, before any degenerate-cut collapse.
    pub fn bucket_count(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::Quantiles(qs) => qs.len() + 1,
        }
    }

    fn interior_quantiles(&self) -> Vec<f64> {
        match self {
            Self::Count(n) => (1..*n).map(|i| i as f64 / *n as f64).collect(),
            Self::Quantiles(qs) => qs.clone(),
        }
    }
}

/// Interior cuts of one period's sort, ready to classify the cross-section.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoints {
    cuts: Vec<f64>,
}

impl Breakpoints {
    /// Compute breakpoints from the reference subset's values.
    ///
    /// Quantiles use linear interpolation between order statistics. Duplicate
    /// interior cuts collapse into one, reducing the effective bucket count
    /// for this period only.
    pub fn from_reference(reference: &[f64], spec: &BucketSpec) -> Result<Self> {
        spec.validate()?;
        let mut values: Vec<f64> = reference.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Err(SortError::EmptyReference);
        }
        values.sort_unstable_by(|a, b| a.total_cmp(b));

        let mut cuts: Vec<f64> = spec
            .interior_quantiles()
            .iter()
            .map(|q| quantile_linear(&values, *q))
            .collect();
        cuts.dedup();
        Ok(Self { cuts })
    }

    /// Effective bucket count after degenerate-cut collapse.
    pub fn effective_buckets(&self) -> usize {
        self.cuts.len() + 1
    }

    /// Interior cuts, non-decreasing.
    pub fn cuts(&self) -> &[f64] {
        &self.cuts
    }

    /// Assign a value to its bucket label in `1..=effective_buckets()`.
    ///
    /// Non-finite values have no place in the ordering and return `None`
    /// rather than a substituted label.
    pub fn assign(&self, value: f64) -> Option<u32> {
        if !value.is_finite() {
            return None;
        }
        // Left-closed intervals: a value equal to a cut goes in the bucket
        // above it.
        Some((self.cuts.partition_point(|cut| *cut <= value) + 1) as u32)
    }
}

/// Quantile of ascending `sorted` with linear interpolation between order
/// statistics.
fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = q * (n - 1) as f64;
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    if lo + 1 >= n {
        return sorted[n - 1];
    }
    sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn median_split_uses_linear_interpolation() {
        let bp = Breakpoints::from_reference(&[1.0, 2.0, 3.0, 4.0], &BucketSpec::Count(2)).unwrap();
        assert_eq!(bp.cuts(), &[2.5]);
        assert_eq!(bp.assign(1.0), Some(1));
        assert_eq!(bp.assign(2.0), Some(1));
        assert_eq!(bp.assign(3.0), Some(2));
        assert_eq!(bp.assign(4.0), Some(2));
    }

    #[test]
    fn tercile_cuts_match_hand_computation() {
        // 30th/70th percentiles of 1..=6: h = 1.5 -> 2.5, h = 3.5 -> 4.5.
        let values: Vec<f64> = (1..=6).map(f64::from).collect();
        let bp =
            Breakpoints::from_reference(&values, &BucketSpec::Quantiles(vec![0.3, 0.7])).unwrap();
        assert_relative_eq!(bp.cuts()[0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(bp.cuts()[1], 4.5, epsilon = 1e-12);
        assert_eq!(bp.assign(2.0), Some(1));
        assert_eq!(bp.assign(3.0), Some(2));
        assert_eq!(bp.assign(4.5), Some(3));
    }

    #[test]
    fn value_on_cut_goes_to_upper_bucket() {
        let bp = Breakpoints::from_reference(&[0.0, 10.0], &BucketSpec::Count(2)).unwrap();
        assert_eq!(bp.cuts(), &[5.0]);
        assert_eq!(bp.assign(5.0), Some(2));
    }

    #[test]
    fn extremes_beyond_reference_range_are_still_classified() {
        let bp = Breakpoints::from_reference(&[1.0, 2.0, 3.0], &BucketSpec::Count(3)).unwrap();
        assert_eq!(bp.assign(-1e9), Some(1));
        assert_eq!(bp.assign(1e9), Some(bp.effective_buckets() as u32));
    }

    #[test]
    fn non_finite_values_get_no_label() {
        let bp = Breakpoints::from_reference(&[1.0, 2.0, 3.0, 4.0], &BucketSpec::Count(2)).unwrap();
        assert_eq!(bp.assign(f64::NAN), None);
        assert_eq!(bp.assign(f64::INFINITY), None);
        assert_eq!(bp.assign(f64::NEG_INFINITY), None);
    }

    #[test]
    fn duplicate_cuts_collapse_and_reduce_bucket_count() {
        let bp = Breakpoints::from_reference(
            &[5.0, 5.0, 5.0, 5.0],
            &BucketSpec::Quantiles(vec![0.3, 0.7]),
        )
        .unwrap();
        assert_eq!(bp.effective_buckets(), 2);
        assert!(bp.cuts().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn empty_reference_is_an_error() {
        assert!(matches!(
            Breakpoints::from_reference(&[], &BucketSpec::Count(2)),
            Err(SortError::EmptyReference)
        ));
    }

    #[rstest]
    #[case(BucketSpec::Count(1))]
    #[case(BucketSpec::Quantiles(vec![]))]
    #[case(BucketSpec::Quantiles(vec![0.0, 0.5]))]
    #[case(BucketSpec::Quantiles(vec![0.7, 0.3]))]
    fn invalid_specs_are_rejected(#[case] spec: BucketSpec) {
        assert!(spec.validate().is_err());
    }
}
