#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/albany/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod breakpoints;
pub mod error;
pub mod famafrench;
pub mod portfolio;
pub mod sort;

// Re-export main types
pub use breakpoints::{Breakpoints, BucketSpec};
pub use error::{Result, SortError};
pub use famafrench::{
    FactorLeg, FactorRecipe, ReplicationConfig, compose_factors, ff3_recipes, ff5_recipes,
    replicate_ff3, replicate_ff5, sorting_date_for, with_sorting_dates,
};
pub use portfolio::{long_short, weighted_portfolio_returns};
pub use sort::{SortConfig, SortEngine, SortMode, SortOutput, SortVariable};
