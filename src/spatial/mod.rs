//! Reference systems, raster layers and vector boundaries
//!
//! This module contains the spatial side of the pipeline:
//! - Coordinate reference systems and point projection
//! - Raster grids, resampling and extraction at sites
//! - Boundary polygons for grouping sites

/// Boundary polygons and point-in-polygon tests
pub mod boundary;
/// Reference systems and coordinate transforms
pub mod crs;
/// Point and buffer statistics at site locations
pub mod extraction;
/// Georeferenced raster grids and cell algebra
pub mod raster;
/// Aggregation and reprojection of rasters
pub mod resample;

pub use raster::Raster;
