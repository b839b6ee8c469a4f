//! Pipeline constants and the study manifest

use crate::io::error::{CamtrapError, Result, WithPath, invalid_parameter};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// Buffer extraction defaults
/// Buffer radii in metres used for habitat proportions
pub const DEFAULT_BUFFER_RADII: [f64; 3] = [250.0, 500.0, 1000.0];

/// Reference system used when the manifest doesn't name one (UTM 36S)
pub const DEFAULT_STUDY_CRS: &str = "EPSG:32736";

/// Raster band read when a layer doesn't name one (1-based)
pub const DEFAULT_BAND: usize = 1;

// Detection table defaults
/// Image count assumed for events without an `images` column
pub const DEFAULT_IMAGES_PER_EVENT: u64 = 1;
/// Token treated as a missing value in delimited tables
pub const NULL_VALUE_TOKEN: &str = "NA";
/// Species tags counted towards livestock pressure
pub const DEFAULT_LIVESTOCK_SPECIES: [&str; 4] = ["cattle", "shoat", "sheep_goat", "donkey"];

// Derived covariate names
/// Distance from each site to the nearest water cell
pub const WATER_DISTANCE_COVARIATE: &str = "dist_water";
/// Proportion of sampled days with livestock detected
pub const LIVESTOCK_COVARIATE: &str = "livestock";
/// Categorical grouping factor name usable in formulas
pub const CONSERVANCY_FACTOR: &str = "conservancy";
/// Names a continuous layer may not take
pub const RESERVED_COVARIATES: [&str; 3] =
    [WATER_DISTANCE_COVARIATE, LIVESTOCK_COVARIATE, CONSERVANCY_FACTOR];

// Model fitting limits, matching the customary GLM defaults
/// Maximum IRLS iterations before reporting non-convergence
pub const IRLS_MAX_ITERATIONS: usize = 25;
/// Relative deviance change that counts as converged
pub const IRLS_TOLERANCE: f64 = 1e-8;

// Output settings
/// Directory outputs are written to when neither CLI nor manifest sets one
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// File name of the assembled covariate table
pub const COVARIATE_TABLE_NAME: &str = "covariates.csv";
/// Longest side of rendered raster maps in pixels
pub const MAP_MAX_DIMENSION: u32 = 1024;
/// Radius of the square marker drawn for each site
pub const SITE_MARKER_RADIUS: i64 = 3;

// Logging and progress
/// Environment variable holding a tracing filter directive
pub const LOG_ENV_VAR: &str = "CAMTRAP_LOG";
/// Width of progress bars in characters
pub const PROGRESS_BAR_WIDTH: u16 = 40;

/// Derivation applied to a continuous layer after loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Values are used as read
    #[default]
    None,
    /// Counts per cell become `ln(1 + count / km²)`
    LogDensity,
}

/// Habitat (categorical land-cover) layer settings
#[derive(Debug, Clone, Deserialize)]
pub struct HabitatLayerConfig {
    /// GeoTIFF path
    pub path: PathBuf,
    /// 1-based band index
    #[serde(default = "default_band")]
    pub band: usize,
    /// Class code to covariate prefix
    pub classes: BTreeMap<u32, String>,
    /// Buffer radii in metres
    #[serde(default = "default_radii")]
    pub radii: Vec<f64>,
    /// Class codes treated as surface water for distance-to-water
    #[serde(default)]
    pub water_classes: Vec<u32>,
    /// Target resolution in metres when the layer must be reprojected
    #[serde(default)]
    pub resolution: Option<f64>,
}

/// Continuous layer settings (population, climate)
#[derive(Debug, Clone, Deserialize)]
pub struct ContinuousLayerConfig {
    /// Covariate name produced by this layer
    pub name: String,
    /// GeoTIFF path
    pub path: PathBuf,
    /// 1-based band index
    #[serde(default = "default_band")]
    pub band: usize,
    /// Integer aggregation factor applied before derivation
    #[serde(default)]
    pub aggregate: Option<usize>,
    /// Per-cell derivation
    #[serde(default)]
    pub derive: Derivation,
    /// Buffer radius in metres; point extraction when absent
    #[serde(default)]
    pub radius: Option<f64>,
    /// Target resolution in metres when the layer must be reprojected
    #[serde(default)]
    pub resolution: Option<f64>,
}

/// A named model formula
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model name used in reports
    pub name: String,
    /// Right-hand side such as `grassland_500 + dist_water`
    pub formula: String,
}

/// Study manifest describing every input of a pipeline run
#[derive(Debug, Clone, Deserialize)]
pub struct StudyConfig {
    /// Study reference system as `EPSG:<code>`
    #[serde(default = "default_crs")]
    pub crs: String,
    /// Site metadata table
    pub sites: PathBuf,
    /// Daily effort table
    pub effort: PathBuf,
    /// Tagged detection events table
    pub detections: PathBuf,
    /// Optional GeoJSON boundary polygons
    #[serde(default)]
    pub boundaries: Option<PathBuf>,
    /// Species modelled
    pub species: Vec<String>,
    /// Species counted as livestock
    #[serde(default = "default_livestock")]
    pub livestock_species: Vec<String>,
    /// Habitat layer
    #[serde(default)]
    pub habitat: Option<HabitatLayerConfig>,
    /// Continuous layers
    #[serde(default)]
    pub layers: Vec<ContinuousLayerConfig>,
    /// Models fitted for every species
    pub models: Vec<ModelConfig>,
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_band() -> usize {
    DEFAULT_BAND
}

fn default_radii() -> Vec<f64> {
    DEFAULT_BUFFER_RADII.to_vec()
}

fn default_crs() -> String {
    DEFAULT_STUDY_CRS.to_string()
}

fn default_livestock() -> Vec<String> {
    DEFAULT_LIVESTOCK_SPECIES
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl StudyConfig {
    /// Load a manifest, resolving relative input paths against its directory
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read, isn't valid JSON, or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CamtrapError::FileSystem {
            path: path.to_path_buf(),
            operation: "read manifest",
            source: e,
        })?;
        let mut config = Self::from_json(&text).with_path(path)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a manifest from JSON text without touching the filesystem
    ///
    /// # Errors
    ///
    /// Returns an error if the text isn't a valid manifest
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)?;
        config.species = config.species.iter().map(|s| species_tag(s)).collect();
        config.livestock_species = config
            .livestock_species
            .iter()
            .map(|s| species_tag(s))
            .collect();
        Ok(config)
    }

    /// Make every relative path relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.sites);
        resolve(&mut self.effort);
        resolve(&mut self.detections);
        if let Some(b) = self.boundaries.as_mut() {
            resolve(b);
        }
        if let Some(h) = self.habitat.as_mut() {
            resolve(&mut h.path);
        }
        for layer in &mut self.layers {
            resolve(&mut layer.path);
        }
        resolve(&mut self.output_dir);
    }

    /// Check manifest consistency
    ///
    /// # Errors
    ///
    /// Returns an error for empty species or model lists, repeated species,
    /// non-positive radii, zero bands or aggregation factors, duplicate covariate
    /// or model names, and layers named like a derived covariate
    pub fn validate(&self) -> Result<()> {
        if self.species.is_empty() {
            return Err(invalid_parameter(
                "species",
                &"[]",
                &"at least one species is required",
            ));
        }
        let mut species = BTreeSet::new();
        for name in &self.species {
            if !species.insert(name.as_str()) {
                return Err(invalid_parameter(
                    "species",
                    name,
                    &"species must be listed once",
                ));
            }
        }
        if self.models.is_empty() {
            return Err(invalid_parameter(
                "models",
                &"[]",
                &"at least one model is required",
            ));
        }

        let mut model_names = BTreeSet::new();
        for model in &self.models {
            if !model_names.insert(model.name.as_str()) {
                return Err(invalid_parameter(
                    "models",
                    &model.name,
                    &"model names must be unique",
                ));
            }
        }

        let mut covariates = BTreeSet::new();
        if let Some(habitat) = &self.habitat {
            if habitat.band == 0 {
                return Err(invalid_parameter("habitat.band", &0, &"bands are 1-based"));
            }
            for radius in &habitat.radii {
                if !(radius.is_finite() && *radius > 0.0) {
                    return Err(invalid_parameter(
                        "habitat.radii",
                        radius,
                        &"radii must be positive",
                    ));
                }
            }
            for name in habitat.classes.values() {
                for radius in &habitat.radii {
                    let covariate = habitat_covariate_name(name, *radius);
                    if RESERVED_COVARIATES.contains(&covariate.as_str()) {
                        return Err(invalid_parameter(
                            "habitat.classes",
                            name,
                            &"name is taken by a derived covariate",
                        ));
                    }
                    covariates.insert(covariate);
                }
            }
        }

        for layer in &self.layers {
            if layer.band == 0 {
                return Err(invalid_parameter("layers.band", &0, &"bands are 1-based"));
            }
            if layer.aggregate == Some(0) {
                return Err(invalid_parameter(
                    "layers.aggregate",
                    &0,
                    &"aggregation factor must be at least 1",
                ));
            }
            if let Some(radius) = layer.radius {
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(invalid_parameter(
                        "layers.radius",
                        &radius,
                        &"radius must be positive",
                    ));
                }
            }
            if RESERVED_COVARIATES.contains(&layer.name.as_str()) {
                return Err(invalid_parameter(
                    "layers.name",
                    &layer.name,
                    &"name is taken by a derived covariate",
                ));
            }
            if !covariates.insert(layer.name.clone()) {
                return Err(invalid_parameter(
                    "layers.name",
                    &layer.name,
                    &"covariate names must be unique",
                ));
            }
        }

        Ok(())
    }
}

/// Canonical form of a species tag: trimmed and lowercase
pub fn species_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Covariate name for the proportion of `class_name` within `radius` metres
pub fn habitat_covariate_name(class_name: &str, radius: f64) -> String {
    format!("{class_name}_{}", radius.round() as i64)
}
