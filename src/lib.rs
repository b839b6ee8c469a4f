//! Camera-trap occupancy pipeline: from site tables and raster layers to binomial GLMs
//!
//! Site metadata, daily effort and tagged detections are joined into one record
//! per site. Habitat, population and climate rasters are brought into the study
//! reference system and sampled at each site, directly or within buffers. The
//! resulting covariates are standardised and candidate logit models of the
//! proportion of days a species was detected are fitted and compared by AIC.

#![forbid(unsafe_code)]

/// Site tables, effort summaries and per-species model data
pub mod analysis;
/// Input/output operations and error handling
pub mod io;
/// Linear algebra and summary statistics
pub mod math;
/// Formulas, binomial GLM fitting and model comparison
pub mod model;
/// Stage execution from manifest to outputs
pub mod pipeline;
/// Reference systems, rasters, extraction and boundaries
pub mod spatial;

pub use io::error::{CamtrapError, Result};
