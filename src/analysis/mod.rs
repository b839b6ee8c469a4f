//! Site tables, sampling effort and per-species model data

/// Response and covariate table for one species
pub mod covariates;
/// Effort and detection day summaries
pub mod effort;
/// Site records and left joins
pub mod sites;
