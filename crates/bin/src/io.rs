//! CSV loading and argument parsing shared by the subcommands.

use albany_sorts::{BucketSpec, SortVariable};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced directly by the CLI layer.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Failed to read an input file.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Input path.
        path: PathBuf,
        /// Underlying reader error.
        source: polars::error::PolarsError,
    },

    /// An argument did not parse.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

/// Read a CSV file with header and date inference.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame, CliError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(CsvReader::finish)
        .map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Parse a sort variable spec: `column:N` for N buckets, or
/// `column:q1,q2,...` for explicit interior quantiles.
pub(crate) fn parse_sort_variable(spec: &str) -> Result<SortVariable, CliError> {
    let (column, layout) = spec
        .split_once(':')
        .ok_or_else(|| CliError::InvalidArg(format!("expected column:buckets, got {spec}")))?;
    if column.is_empty() {
        return Err(CliError::InvalidArg(format!("empty column in {spec}")));
    }
    let spec_parsed = if layout.contains('.') || layout.contains(',') {
        let quantiles = layout
            .split(',')
            .map(|q| {
                q.trim()
                    .parse::<f64>()
                    .map_err(|_| CliError::InvalidArg(format!("bad quantile {q} in {spec}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        BucketSpec::Quantiles(quantiles)
    } else {
        let count = layout
            .parse::<usize>()
            .map_err(|_| CliError::InvalidArg(format!("bad bucket count {layout} in {spec}")))?;
        BucketSpec::Count(count)
    };
    Ok(SortVariable::new(column, spec_parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_counts() {
        let var = parse_sort_variable("size:2").unwrap();
        assert_eq!(var.column, "size");
        assert_eq!(var.spec, BucketSpec::Count(2));
    }

    #[test]
    fn parses_quantile_lists() {
        let var = parse_sort_variable("bm:0.3,0.7").unwrap();
        assert_eq!(var.spec, BucketSpec::Quantiles(vec![0.3, 0.7]));
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(parse_sort_variable("size").is_err());
        assert!(parse_sort_variable(":2").is_err());
        assert!(parse_sort_variable("size:x").is_err());
    }
}
