/// GeoJSON boundary input
pub mod boundary;
/// Command-line interface
pub mod cli;
/// Constants and study manifest
pub mod configuration;
/// Error types and result alias
pub mod error;
/// PNG map rendering
pub mod image;
/// Progress bars for pipeline stages
pub mod progress;
/// GeoTIFF input and output
pub mod raster;
/// Delimited table input and output
pub mod table;
