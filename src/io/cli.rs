//! Command-line interface for running a study manifest through the pipeline

use crate::io::configuration::{LOG_ENV_VAR, StudyConfig, species_tag};
use crate::io::error::{Result, computation_error};
use crate::pipeline::executor::{Pipeline, PipelineOptions, PipelineReport};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "camtrap")]
#[command(
    author,
    version,
    about = "Extract camera-trap site covariates and compare binomial occupancy models"
)]
/// Command-line arguments for the pipeline
pub struct Cli {
    /// Study manifest (JSON)
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Output directory, overriding the manifest
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Species to model, overriding the manifest (repeatable)
    #[arg(short, long = "species", value_name = "SPECIES")]
    pub species: Vec<String>,

    /// Skip rendering PNG maps of the raster layers
    #[arg(long)]
    pub no_plots: bool,

    /// Suppress progress output and informational logs
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log debug details
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Log level used when the environment doesn't set a filter
    pub const fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Pipeline options derived from the flags
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            output_dir: self.output.clone(),
            species: self.species.iter().map(|s| species_tag(s)).collect(),
            render_maps: !self.no_plots,
            show_progress: self.should_show_progress(),
            ..PipelineOptions::default()
        }
    }
}

/// Install the global tracing subscriber
///
/// A filter in `CAMTRAP_LOG` wins over the level chosen by the flags.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| computation_error("init tracing", &e))
}

/// Load the manifest and run the pipeline
///
/// # Errors
///
/// Returns an error if the manifest can't be loaded or any stage fails
#[allow(clippy::print_stderr)]
pub fn run(cli: &Cli) -> Result<PipelineReport> {
    let config = StudyConfig::load(&cli.manifest)?;
    let mut pipeline = Pipeline::new(config, cli.pipeline_options())?;
    let report = pipeline.run()?;

    if !cli.quiet {
        for comparison in &report.comparisons {
            if let Some(best) = comparison.best() {
                eprintln!(
                    "{}: lowest AIC {} ({:.2}) over {} sites",
                    comparison.species, best.name, best.aic, comparison.n_sites
                );
            }
        }
        eprintln!("Outputs written to {}", pipeline.output_dir().display());
    }
    Ok(report)
}
