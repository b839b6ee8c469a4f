//! Error types and context management for pipeline operations

use std::fmt;
use std::path::{Path, PathBuf};

/// Main error type for all pipeline operations
#[derive(Debug)]
pub enum CamtrapError {
    /// Failed to read or parse a delimited table
    TableLoad {
        /// Path to the table file
        path: PathBuf,
        /// Underlying table reader error
        source: polars::error::PolarsError,
    },

    /// A required column is absent or has an unusable type
    MissingColumn {
        /// Path to the table file
        path: PathBuf,
        /// Name of the column
        column: String,
    },

    /// Failed to decode or encode a raster file
    Raster {
        /// Path to the raster file
        path: PathBuf,
        /// Underlying TIFF error
        source: tiff::TiffError,
    },

    /// Failed to parse a JSON document (manifest or boundary file)
    Json {
        /// Path to the JSON file
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Input data doesn't meet pipeline requirements
    InvalidData {
        /// Description of what's wrong with the data
        reason: String,
    },

    /// Two layers or point sets are in different reference systems
    CrsMismatch {
        /// Reference system that was expected
        expected: String,
        /// Reference system that was found
        found: String,
    },

    /// A site referenced by an operation does not exist in the table
    UnknownSite {
        /// Site identifier that failed to resolve
        site_id: String,
    },

    /// A covariate requested by a model is absent for a site
    MissingCovariate {
        /// Site lacking the covariate
        site_id: String,
        /// Covariate name
        covariate: String,
    },

    /// Parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Iteratively reweighted least squares did not converge
    NonConvergence {
        /// Model name
        model: String,
        /// Iterations performed
        iterations: usize,
        /// Relative deviance change at the last iteration
        last_change: f64,
    },

    /// Failed to save a rendered map to disk
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Numerical computation produced invalid result
    Computation {
        /// Name of the computation that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },
}

impl fmt::Display for CamtrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableLoad { path, source } => {
                write!(f, "Failed to load table '{}': {source}", path.display())
            }
            Self::MissingColumn { path, column } => {
                write!(
                    f,
                    "Table '{}' has no usable column '{column}'",
                    path.display()
                )
            }
            Self::Raster { path, source } => {
                write!(f, "Raster error for '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "Failed to parse JSON '{}': {source}", path.display())
            }
            Self::InvalidData { reason } => {
                write!(f, "Invalid input data: {reason}")
            }
            Self::CrsMismatch { expected, found } => {
                write!(
                    f,
                    "Reference system mismatch: expected {expected}, found {found}"
                )
            }
            Self::UnknownSite { site_id } => {
                write!(f, "Unknown site '{site_id}'")
            }
            Self::MissingCovariate { site_id, covariate } => {
                write!(f, "Site '{site_id}' has no value for covariate '{covariate}'")
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::NonConvergence {
                model,
                iterations,
                last_change,
            } => {
                write!(
                    f,
                    "Model '{model}' did not converge after {iterations} iterations (last relative change {last_change:e})"
                )
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::Computation { operation, reason } => {
                write!(f, "Computation error in {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for CamtrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TableLoad { source, .. } => Some(source),
            Self::Raster { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for pipeline results
pub type Result<T> = std::result::Result<T, CamtrapError>;

/// Attaches the file being processed to errors raised by file-format libraries
pub trait WithPath<T> {
    /// Replace the placeholder path of a converted error with `path`
    ///
    /// # Errors
    ///
    /// Propagates the original error with the path applied
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T, E> WithPath<T> for std::result::Result<T, E>
where
    E: Into<CamtrapError>,
{
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();
            match &mut error {
                CamtrapError::TableLoad { path: p, .. }
                | CamtrapError::MissingColumn { path: p, .. }
                | CamtrapError::Raster { path: p, .. }
                | CamtrapError::Json { path: p, .. }
                | CamtrapError::ImageExport { path: p, .. }
                | CamtrapError::FileSystem { path: p, .. } => {
                    *p = path.to_path_buf();
                }
                _ => {}
            }
            error
        })
    }
}

impl From<polars::error::PolarsError> for CamtrapError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::TableLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<tiff::TiffError> for CamtrapError {
    fn from(err: tiff::TiffError) -> Self {
        Self::Raster {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<serde_json::Error> for CamtrapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<image::ImageError> for CamtrapError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageExport {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for CamtrapError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> CamtrapError {
    CamtrapError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a computation error
pub fn computation_error(operation: &'static str, reason: &impl ToString) -> CamtrapError {
    CamtrapError::Computation {
        operation,
        reason: reason.to_string(),
    }
}

/// Create an invalid data error
pub fn invalid_data(reason: &impl ToString) -> CamtrapError {
    CamtrapError::InvalidData {
        reason: reason.to_string(),
    }
}
