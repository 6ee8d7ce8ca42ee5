//! Subcommand implementations.

pub(crate) mod betas;
pub(crate) mod factors;
pub(crate) mod sort;
