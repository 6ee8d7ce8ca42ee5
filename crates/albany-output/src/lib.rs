#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod summary;

pub use export::{
    BetaExport, ExportError, ExportFormat, Exporter, FactorReturnExport, PortfolioReturnExport,
    write_frame_csv,
};
pub use summary::{RunSummary, SortSummary};
