//! Export functionality for pipeline results.
//!
//! Record-oriented exports (beta panels, portfolio and factor return series)
//! serialize through serde to CSV and JSON; whole frames go straight to CSV
//! through polars.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame writing error.
    #[error("frame writing error: {0}")]
    Frame(#[from] polars::error::PolarsError),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// One rolling beta estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BetaExport {
    /// Entity identifier.
    pub entity_id: i64,

    /// Estimation period (window end).
    pub period: NaiveDate,

    /// Estimated market beta.
    pub beta: f64,
}

/// One portfolio cell's return in one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioReturnExport {
    /// Return period.
    pub period: NaiveDate,

    /// Primary portfolio label.
    pub portfolio: u32,

    /// Secondary label for double sorts.
    pub secondary: Option<u32>,

    /// Weighted portfolio return.
    pub ret: f64,
}

/// One factor observation in a replicated series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorReturnExport {
    /// Return period.
    pub period: NaiveDate,

    /// Factor name (e.g. `smb`).
    pub factor: String,

    /// Factor return.
    pub value: f64,
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_string<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes).unwrap_or_default())
}

macro_rules! impl_record_exporter {
    ($record:ty) => {
        impl Exporter for Vec<$record> {
            fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
                match format {
                    ExportFormat::Csv => csv_string(self),
                    ExportFormat::Json => Ok(serde_json::to_string(self)?),
                    ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
                }
            }
        }
    };
}

impl_record_exporter!(BetaExport);
impl_record_exporter!(PortfolioReturnExport);
impl_record_exporter!(FactorReturnExport);

/// Write a whole frame to a CSV file with headers.
pub fn write_frame_csv(frame: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path)?;
    CsvWriter::new(file).include_header(true).finish(frame)?;
    Ok(())
}
