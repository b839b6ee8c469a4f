//! Numerical utilities for covariate scaling and model fitting

/// Cholesky factorisation and solves for small dense systems
pub mod linalg;
/// Means, standard deviations and z-scores
pub mod statistics;
