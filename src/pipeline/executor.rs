//! Stage runner taking a study manifest through to fitted model comparisons
//!
//! Stages run strictly in order and each consumes the previous stage's site
//! table:
//!
//! 1. site metadata into projected points
//! 2. boundary polygons and conservancy grouping
//! 3. effort and detection joins with zero fill
//! 4. raster loading, aggregation, reprojection and derivation
//! 5. point and buffer extraction into site covariates
//! 6. covariate assembly, standardisation and GLM comparison per species
//!
//! Any failure aborts the run; nothing is retried.

use crate::analysis::covariates::CovariateTable;
use crate::analysis::effort::{DetectionSummaryTable, EffortSummary};
use crate::analysis::sites::SiteTable;
use crate::io::boundary::load_boundaries;
use crate::io::configuration::{
    COVARIATE_TABLE_NAME, ContinuousLayerConfig, Derivation, HabitatLayerConfig,
    LIVESTOCK_COVARIATE, StudyConfig, WATER_DISTANCE_COVARIATE, habitat_covariate_name,
    species_tag,
};
use crate::io::error::{CamtrapError, Result};
use crate::io::image::render_raster_png;
use crate::io::progress::ProgressManager;
use crate::io::raster::{read_geotiff, write_geotiff};
use crate::io::table::{load_daily_effort, load_detection_events, load_site_metadata, write_csv};
use crate::model::comparison::{ModelComparison, compare_models};
use crate::model::formula::ModelSpec;
use crate::model::glm::IrlsConfig;
use crate::spatial::boundary::BoundarySet;
use crate::spatial::crs::Crs;
use crate::spatial::extraction::{
    distance_to_class, extract_buffer_mean, extract_class_proportions, extract_point,
};
use crate::spatial::raster::{LayerKind, Raster};
use crate::spatial::resample::{aggregate, reproject};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

const STAGES: [&str; 6] = [
    "sites",
    "boundaries",
    "joins",
    "rasters",
    "extraction",
    "models",
];

// Metres per degree of latitude, used to size reprojected geographic layers
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Run-time choices that aren't part of the study manifest
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Replaces the manifest's output directory
    pub output_dir: Option<PathBuf>,
    /// Replaces the manifest's species list when non-empty
    pub species: Vec<String>,
    /// Write a PNG map per prepared raster layer
    pub render_maps: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// IRLS stopping rule
    pub irls: IrlsConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            species: Vec::new(),
            render_maps: true,
            show_progress: false,
            irls: IrlsConfig::default(),
        }
    }
}

/// How a prepared layer becomes site covariates
#[derive(Debug, Clone)]
enum Extraction {
    /// Class proportions per radius plus optional distance to water
    Habitat(HabitatLayerConfig),
    /// Single value, buffered when a radius is set
    Continuous {
        name: String,
        radius: Option<f64>,
    },
}

/// A raster ready for extraction in the study reference system
#[derive(Debug, Clone)]
pub struct PreparedLayer {
    /// Layer name, also used for output file names
    pub name: String,
    /// Raster in the study reference system
    pub raster: Raster,
    extraction: Extraction,
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Final site table with joins and covariates
    pub sites: SiteTable,
    /// Prepared raster layers
    pub layers: Vec<PreparedLayer>,
    /// Standardised model data per species
    pub covariate_tables: Vec<CovariateTable>,
    /// Model comparison per species
    pub comparisons: Vec<ModelComparison>,
    /// Files written, in write order
    pub outputs: Vec<PathBuf>,
}

impl PipelineReport {
    /// Comparison for one species
    pub fn comparison(&self, species: &str) -> Option<&ModelComparison> {
        self.comparisons.iter().find(|c| c.species == species)
    }
}

/// Executes the six stages for one study
pub struct Pipeline {
    config: StudyConfig,
    options: PipelineOptions,
    crs: Crs,
    models: Vec<ModelSpec>,
    output_dir: PathBuf,
    progress: Option<ProgressManager>,
    outputs: Vec<PathBuf>,
}

impl Pipeline {
    /// Validate the manifest and prepare a run
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is inconsistent, its reference system
    /// is unsupported, or a model formula doesn't parse
    pub fn new(mut config: StudyConfig, options: PipelineOptions) -> Result<Self> {
        if !options.species.is_empty() {
            config.species = options.species.iter().map(|s| species_tag(s)).collect();
        }
        config.validate()?;
        let crs = Crs::parse(&config.crs)?;
        let models = config
            .models
            .iter()
            .map(|m| ModelSpec::parse(&m.name, &m.formula))
            .collect::<Result<Vec<_>>>()?;
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output_dir.clone());
        let progress = options.show_progress.then(ProgressManager::new);

        Ok(Self {
            config,
            options,
            crs,
            models,
            output_dir,
            progress,
            outputs: Vec::new(),
        })
    }

    /// Study reference system
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Directory outputs are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run every stage and write the outputs
    ///
    /// # Errors
    ///
    /// Returns the first error from any stage
    pub fn run(&mut self) -> Result<PipelineReport> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| CamtrapError::FileSystem {
            path: self.output_dir.clone(),
            operation: "create output directory",
            source: e,
        })?;
        if let Some(ref mut pm) = self.progress {
            pm.initialize(STAGES.len());
        }

        let [sites_stage, boundary_stage, join_stage, raster_stage, extract_stage, model_stage] =
            STAGES;

        let mut sites = self.stage(sites_stage, Self::load_sites)?;
        let boundaries = self.stage(boundary_stage, |p| p.load_boundaries(&mut sites))?;
        self.stage(join_stage, |p| p.join_tables(&mut sites))?;
        let layers = self.stage(raster_stage, |p| p.prepare_layers(&sites, boundaries.as_ref()))?;
        self.stage(extract_stage, |p| p.extract_covariates(&mut sites, &layers))?;
        let (covariate_tables, comparisons) = self.stage(model_stage, |p| p.fit_models(&sites))?;

        if let Some(ref pm) = self.progress {
            pm.finish();
        }
        info!(
            sites = sites.len(),
            species = comparisons.len(),
            outputs = self.outputs.len(),
            "pipeline complete"
        );

        Ok(PipelineReport {
            sites,
            layers,
            covariate_tables,
            comparisons,
            outputs: std::mem::take(&mut self.outputs),
        })
    }

    fn stage<T>(&mut self, name: &str, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let span = info_span!("stage", stage = name);
        let _entered = span.enter();
        let start = Instant::now();
        if let Some(ref pm) = self.progress {
            pm.start_stage(name);
        }
        let value = body(self)?;
        let elapsed = start.elapsed();
        debug!(elapsed_ms = elapsed.as_millis() as u64, "stage finished");
        if let Some(ref mut pm) = self.progress {
            pm.complete_stage(name, elapsed);
        }
        Ok(value)
    }

    fn record_output(&mut self, path: PathBuf) {
        debug!(path = %path.display(), "wrote output");
        self.outputs.push(path);
    }

    fn load_sites(&mut self) -> Result<SiteTable> {
        let rows = load_site_metadata(&self.config.sites)?;
        let sites = SiteTable::from_metadata(&rows, self.crs)?;
        info!(sites = sites.len(), crs = %self.crs, "loaded sites");
        Ok(sites)
    }

    fn load_boundaries(&mut self, sites: &mut SiteTable) -> Result<Option<BoundarySet>> {
        let Some(path) = self.config.boundaries.clone() else {
            return Ok(None);
        };
        let boundaries = load_boundaries(&path, self.crs)?;
        let assigned = sites.assign_conservancies(&boundaries)?;
        let unassigned = sites.iter().filter(|s| s.conservancy.is_none()).count();
        if unassigned > 0 {
            warn!(unassigned, "sites outside every boundary polygon");
        }
        info!(regions = boundaries.boundaries.len(), assigned, "loaded boundaries");
        Ok(Some(boundaries))
    }

    fn join_tables(&mut self, sites: &mut SiteTable) -> Result<()> {
        let effort = EffortSummary::from_daily(&load_daily_effort(&self.config.effort)?);
        let detections =
            DetectionSummaryTable::from_events(&load_detection_events(&self.config.detections)?);

        let effort_report = sites.join_effort(&effort)?;
        if effort_report.zero_filled > 0 {
            warn!(
                sites = effort_report.zero_filled,
                "sites without active effort will be excluded from models"
            );
        }

        let tagged = detections.species();
        for species in &self.config.species {
            if !tagged.contains(species.as_str()) {
                warn!(species = %species, "species never detected; its response is all zero");
            }
        }
        sites.join_detections(&detections, &effort, &self.config.species)?;
        sites.derive_livestock_pressure(
            &effort,
            &detections,
            &self.config.livestock_species,
            LIVESTOCK_COVARIATE,
        );
        sites.validate()?;
        info!(
            sampled = effort_report.matched,
            species = self.config.species.len(),
            "joined effort and detections"
        );
        Ok(())
    }

    fn prepare_layers(
        &mut self,
        sites: &SiteTable,
        boundaries: Option<&BoundarySet>,
    ) -> Result<Vec<PreparedLayer>> {
        let mut layers = Vec::new();

        if let Some(habitat) = self.config.habitat.clone() {
            let raster = read_geotiff(&habitat.path, habitat.band, LayerKind::Categorical)?;
            let raster = self.to_study_crs(raster, habitat.resolution)?;
            debug!(classes = ?raster.classes(), "habitat classes present");
            layers.push(PreparedLayer {
                name: "habitat".to_string(),
                raster,
                extraction: Extraction::Habitat(habitat),
            });
        }

        for layer in self.config.layers.clone() {
            let raster = self.prepare_continuous(&layer)?;
            layers.push(PreparedLayer {
                name: layer.name.clone(),
                raster,
                extraction: Extraction::Continuous {
                    name: layer.name,
                    radius: layer.radius,
                },
            });
        }

        let positions = sites.positions();
        for layer in &layers {
            let tif = self.output_dir.join(format!("{}.tif", layer.name));
            write_geotiff(&tif, &layer.raster)?;
            self.record_output(tif);
            if self.options.render_maps {
                let png = self.output_dir.join(format!("{}.png", layer.name));
                render_raster_png(&layer.raster, &positions, boundaries, &png)?;
                self.record_output(png);
            }
        }
        info!(layers = layers.len(), "prepared raster layers");
        Ok(layers)
    }

    fn prepare_continuous(&self, layer: &ContinuousLayerConfig) -> Result<Raster> {
        let mut raster = read_geotiff(&layer.path, layer.band, LayerKind::Continuous)?;
        if layer.derive == Derivation::LogDensity {
            raster = raster.density();
        }
        if let Some(factor) = layer.aggregate {
            raster = aggregate(&raster, factor)?;
            debug!(layer = %layer.name, factor, "aggregated");
        }
        raster = self.to_study_crs(raster, layer.resolution)?;
        if layer.derive == Derivation::LogDensity {
            raster = raster.map(f64::ln_1p);
        }
        Ok(raster)
    }

    fn to_study_crs(&self, raster: Raster, resolution: Option<f64>) -> Result<Raster> {
        if raster.crs == self.crs {
            return Ok(raster);
        }
        let resolution = resolution.unwrap_or_else(|| native_resolution(&raster));
        debug!(from = %raster.crs, to = %self.crs, resolution, "reprojecting layer");
        reproject(&raster, self.crs, resolution)
    }

    fn extract_covariates(&mut self, sites: &mut SiteTable, layers: &[PreparedLayer]) -> Result<()> {
        let ids: Vec<String> = sites.iter().map(|s| s.site_id.clone()).collect();
        if let Some(ref mut pm) = self.progress {
            pm.start_task("extraction", ids.len() * layers.len());
        }

        for layer in layers {
            let mut missing = 0usize;
            for id in &ids {
                let position = sites
                    .get(id)
                    .map(|s| s.position)
                    .ok_or_else(|| CamtrapError::UnknownSite {
                        site_id: id.clone(),
                    })?;
                match &layer.extraction {
                    Extraction::Habitat(habitat) => {
                        let codes: Vec<u32> = habitat.classes.keys().copied().collect();
                        for &radius in &habitat.radii {
                            let proportions =
                                extract_class_proportions(&layer.raster, position, radius, &codes)?;
                            for (code, name) in &habitat.classes {
                                let value = proportions.get(code).copied().unwrap_or(0.0);
                                sites.set_covariate(id, &habitat_covariate_name(name, radius), value)?;
                            }
                        }
                        if !habitat.water_classes.is_empty() {
                            match distance_to_class(&layer.raster, position, &habitat.water_classes)? {
                                Some(d) => sites.set_covariate(id, WATER_DISTANCE_COVARIATE, d)?,
                                None => missing += 1,
                            }
                        }
                    }
                    Extraction::Continuous { name, radius } => {
                        let value = match radius {
                            Some(r) => extract_buffer_mean(&layer.raster, position, *r)?,
                            None => extract_point(&layer.raster, position)?,
                        };
                        match value {
                            Some(v) => sites.set_covariate(id, name, v)?,
                            None => missing += 1,
                        }
                    }
                }
                if let Some(ref pm) = self.progress {
                    pm.advance_task(id);
                }
            }
            if missing > 0 {
                warn!(layer = %layer.name, sites = missing, "no valid cells; covariate left missing");
            }
        }

        let path = self.output_dir.join(COVARIATE_TABLE_NAME);
        let mut frame = sites.to_frame(&self.config.species)?;
        write_csv(&path, &mut frame)?;
        self.record_output(path);
        info!(covariates = sites.covariate_names().len(), "extracted covariates");
        Ok(())
    }

    fn fit_models(&mut self, sites: &SiteTable) -> Result<(Vec<CovariateTable>, Vec<ModelComparison>)> {
        let mut terms: Vec<String> = Vec::new();
        for spec in &self.models {
            for term in &spec.terms {
                if !terms.contains(term) {
                    terms.push(term.clone());
                }
            }
        }

        let species = self.config.species.clone();
        if let Some(ref mut pm) = self.progress {
            pm.start_task("models", species.len());
        }

        let mut tables = Vec::new();
        let mut comparisons = Vec::new();
        for sp in &species {
            let mut table = CovariateTable::assemble(sites, sp, &terms)?;
            table.standardize()?;
            let data_path = self.output_dir.join(format!("{sp}_model_data.csv"));
            table.write_csv(&data_path)?;
            self.record_output(data_path);

            let comparison = compare_models(&table, &self.models, &self.options.irls)?;
            let csv_path = self.output_dir.join(format!("{sp}_models.csv"));
            comparison.write_csv(&csv_path)?;
            self.record_output(csv_path);

            let summary_path = self.output_dir.join(format!("{sp}_summary.txt"));
            std::fs::write(&summary_path, comparison.summary_text()).map_err(|e| {
                CamtrapError::FileSystem {
                    path: summary_path.clone(),
                    operation: "write summary",
                    source: e,
                }
            })?;
            self.record_output(summary_path);

            if let Some(ref pm) = self.progress {
                pm.advance_task(sp);
            }
            tables.push(table);
            comparisons.push(comparison);
        }
        Ok((tables, comparisons))
    }
}

/// Approximate cell size in metres, used when no target resolution is given
pub fn native_resolution(raster: &Raster) -> f64 {
    let t = &raster.transform;
    if raster.crs.is_projected() {
        return t.pixel_width.abs().min(t.pixel_height.abs());
    }
    let (_, min_y, _, max_y) = raster.extent();
    let latitude = f64::midpoint(min_y, max_y).to_radians();
    t.pixel_width.abs().min(t.pixel_height.abs()) * METRES_PER_DEGREE * latitude.cos().max(0.01)
}
