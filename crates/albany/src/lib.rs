#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod pipeline;

// Re-export main types from sub-crates
pub use albany_beta as beta;
pub use albany_output as output;
pub use albany_panel as panel;
pub use albany_sorts as sorts;

pub use pipeline::{BetaPipelineConfig, BetaPipelineOutput, PipelineError, run_beta_pipeline};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
