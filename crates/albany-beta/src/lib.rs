#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod batch;
pub mod capm;
pub mod error;
pub mod rolling;

// Re-export main types
pub use batch::{BatchConfig, BatchOutcome, BatchRunner, RunStats, default_workers};
pub use capm::ols_slope;
pub use error::{BetaError, Result};
pub use rolling::{
    BetaObservation, EntityEstimate, EntitySeries, RollingCapmConfig, WindowFailure,
    estimate_entity,
};
