#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod complete;
pub mod error;
pub mod fill;

pub use complete::{PanelConfig, complete_panel, entity_lifespans};
pub use error::{PanelError, Result};
pub use fill::fill_forward_within;
