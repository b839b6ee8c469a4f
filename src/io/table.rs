//! Delimited table input and output
//!
//! Tables are read whole with polars and converted into plain row structs; the
//! joins downstream are keyed on `site_id` and never touch a data frame again.

use crate::io::configuration::{DEFAULT_IMAGES_PER_EVENT, NULL_VALUE_TOKEN, species_tag};
use crate::io::error::{CamtrapError, Result, WithPath, invalid_data};
use polars::prelude::{
    CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame, DataType, NullValues, SerReader,
    SerWriter,
};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// One row of the site metadata table
#[derive(Debug, Clone, PartialEq)]
pub struct SiteMetadataRow {
    /// Site identifier
    pub site_id: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Conservancy, when recorded in the table
    pub conservancy: Option<String>,
}

/// One camera-day of the effort table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffortRow {
    /// Site identifier
    pub site_id: String,
    /// Calendar day
    pub date: String,
    /// Whether the camera was recording that day
    pub active: bool,
}

/// One tagged detection event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRow {
    /// Site identifier
    pub site_id: String,
    /// Calendar day of the event
    pub date: String,
    /// Species tag
    pub species: String,
    /// Images in the event
    pub images: u64,
}

/// Load `site_id, latitude, longitude[, conservancy]`
///
/// # Errors
///
/// Returns an error if the file can't be parsed, a required column is missing,
/// or a row lacks an identifier or coordinate
pub fn load_site_metadata(path: &Path) -> Result<Vec<SiteMetadataRow>> {
    let df = read_csv(path)?;
    let ids = required_strings(&df, path, "site_id")?;
    let lats = required_floats(&df, path, "latitude")?;
    let lons = required_floats(&df, path, "longitude")?;
    let conservancies = if has_column(&df, "conservancy") {
        string_column(&df, path, "conservancy")?
    } else {
        vec![None; df.height()]
    };

    let rows: Vec<SiteMetadataRow> = ids
        .into_iter()
        .zip(lats)
        .zip(lons)
        .zip(conservancies)
        .map(|(((site_id, latitude), longitude), conservancy)| SiteMetadataRow {
            site_id,
            latitude,
            longitude,
            conservancy: conservancy.filter(|c| !c.trim().is_empty()),
        })
        .collect();
    debug!(path = %path.display(), rows = rows.len(), "loaded site metadata");
    Ok(rows)
}

/// Load `site_id, date, active`
///
/// # Errors
///
/// Returns an error if the file can't be parsed or a required value is missing
pub fn load_daily_effort(path: &Path) -> Result<Vec<EffortRow>> {
    let df = read_csv(path)?;
    let ids = required_strings(&df, path, "site_id")?;
    let dates = required_strings(&df, path, "date")?;
    let active = required_floats(&df, path, "active")?;

    let rows: Vec<EffortRow> = ids
        .into_iter()
        .zip(dates)
        .zip(active)
        .map(|((site_id, date), active)| EffortRow {
            site_id,
            date,
            active: active > 0.0,
        })
        .collect();
    debug!(path = %path.display(), rows = rows.len(), "loaded daily effort");
    Ok(rows)
}

/// Load `site_id, date, species[, images]`
///
/// # Errors
///
/// Returns an error if the file can't be parsed, a required value is missing,
/// or an image count is negative
pub fn load_detection_events(path: &Path) -> Result<Vec<DetectionRow>> {
    let df = read_csv(path)?;
    let ids = required_strings(&df, path, "site_id")?;
    let dates = required_strings(&df, path, "date")?;
    let species = required_strings(&df, path, "species")?;
    let images = if has_column(&df, "images") {
        float_column(&df, path, "images")?
    } else {
        vec![None; df.height()]
    };

    let mut rows = Vec::with_capacity(ids.len());
    for (((site_id, date), species), images) in ids.into_iter().zip(dates).zip(species).zip(images)
    {
        let images = match images {
            None => DEFAULT_IMAGES_PER_EVENT,
            Some(n) if n >= 0.0 => n.round() as u64,
            Some(n) => {
                return Err(invalid_data(&format!(
                    "'{}': negative image count {n} at site '{site_id}'",
                    path.display()
                )));
            }
        };
        rows.push(DetectionRow {
            site_id,
            date,
            species: species_tag(&species),
            images,
        });
    }
    debug!(path = %path.display(), rows = rows.len(), "loaded detection events");
    Ok(rows)
}

/// Write a data frame as CSV with a header row
///
/// # Errors
///
/// Returns an error if the file can't be created or written
pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CamtrapError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }
    let mut file = File::create(path).map_err(|e| CamtrapError::FileSystem {
        path: path.to_path_buf(),
        operation: "create table",
        source: e,
    })?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_path(path)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    let parse_options = CsvParseOptions::default()
        .with_null_values(Some(NullValues::AllColumnsSingle(NULL_VALUE_TOKEN.into())));

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_path(path)?
        .finish()
        .with_path(path)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn missing_column(path: &Path, name: &str) -> CamtrapError {
    CamtrapError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    }
}

fn string_column(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .ok()
        .ok_or_else(|| missing_column(path, name))?;
    let cast = column.cast(&DataType::String).with_path(path)?;
    let values = cast.str().with_path(path)?;
    Ok(values
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn float_column(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .ok()
        .ok_or_else(|| missing_column(path, name))?;
    let cast = column
        .cast(&DataType::Float64)
        .ok()
        .ok_or_else(|| missing_column(path, name))?;
    let values = cast.f64().with_path(path)?;
    Ok(values.into_iter().collect())
}

fn required_strings(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<String>> {
    string_column(df, path, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|s| !s.is_empty())
                .ok_or_else(|| missing_value(path, name, row))
        })
        .collect()
}

fn required_floats(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<f64>> {
    float_column(df, path, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|x| x.is_finite())
                .ok_or_else(|| missing_value(path, name, row))
        })
        .collect()
}

fn missing_value(path: &Path, name: &str, row: usize) -> CamtrapError {
    invalid_data(&format!(
        "'{}': missing value in column '{name}' at data row {}",
        path.display(),
        row + 1
    ))
}
