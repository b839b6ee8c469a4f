//! Flat per-site model data for one species
//!
//! Holds the binomial response (days detected out of days sampled) and every
//! covariate the species' models use, over the same set of sites so that models
//! remain comparable by AIC.

use crate::analysis::sites::SiteTable;
use crate::io::configuration::CONSERVANCY_FACTOR;
use crate::io::error::{CamtrapError, Result, computation_error, invalid_data};
use crate::io::table::write_csv;
use crate::math::statistics::z_scores;
use crate::model::glm::DesignMatrix;
use ndarray::Array2;
use polars::prelude::{Column, DataFrame};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Centring and scaling applied to one covariate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    /// Mean subtracted
    pub mean: f64,
    /// Standard deviation divided by
    pub sd: f64,
}

/// Response and covariates for every modelled site of one species
#[derive(Debug, Clone)]
pub struct CovariateTable {
    /// Species modelled
    pub species: String,
    /// Sites in identifier order
    pub site_ids: Vec<String>,
    /// Days detected per site
    pub successes: Vec<u64>,
    /// Days sampled per site
    pub trials: Vec<u64>,
    /// Continuous covariates in request order
    pub continuous: Vec<(String, Vec<f64>)>,
    /// Categorical covariates in request order
    pub factors: Vec<(String, Vec<String>)>,
    /// Scaling applied by [`Self::standardize`]
    pub scaling: BTreeMap<String, Scaling>,
}

impl CovariateTable {
    /// Collect the response and `terms` for every sampled site
    ///
    /// Sites with zero sampled days are left out. `conservancy` is treated as a
    /// factor; every other term must be a numeric covariate of the site.
    ///
    /// # Errors
    ///
    /// Returns `MissingCovariate` if a sampled site lacks a requested term, or an
    /// error when no site has been sampled
    pub fn assemble(table: &SiteTable, species: &str, terms: &[String]) -> Result<Self> {
        let sampled: Vec<_> = table.iter().filter(|s| s.days_sampled > 0).collect();
        if sampled.is_empty() {
            return Err(invalid_data(&format!(
                "no sampled sites available to model '{species}'"
            )));
        }
        let excluded = table.len() - sampled.len();
        if excluded > 0 {
            debug!(species, excluded, "sites without effort excluded");
        }

        let missing = |site_id: &str, term: &str| CamtrapError::MissingCovariate {
            site_id: site_id.to_string(),
            covariate: term.to_string(),
        };

        let mut continuous = Vec::new();
        let mut factors = Vec::new();
        let mut seen = BTreeSet::new();
        for term in terms {
            if !seen.insert(term.as_str()) {
                continue;
            }
            if term == CONSERVANCY_FACTOR {
                let levels = sampled
                    .iter()
                    .map(|s| s.conservancy.clone().ok_or_else(|| missing(&s.site_id, term)))
                    .collect::<Result<Vec<_>>>()?;
                factors.push((term.clone(), levels));
            } else {
                let values = sampled
                    .iter()
                    .map(|s| {
                        s.covariates
                            .get(term)
                            .copied()
                            .ok_or_else(|| missing(&s.site_id, term))
                    })
                    .collect::<Result<Vec<_>>>()?;
                continuous.push((term.clone(), values));
            }
        }

        Ok(Self {
            species: species.to_string(),
            site_ids: sampled.iter().map(|s| s.site_id.clone()).collect(),
            successes: sampled
                .iter()
                .map(|s| u64::from(s.detection(species).days_detected))
                .collect(),
            trials: sampled.iter().map(|s| u64::from(s.days_sampled)).collect(),
            continuous,
            factors,
            scaling: BTreeMap::new(),
        })
    }

    /// Number of modelled sites
    pub const fn len(&self) -> usize {
        self.site_ids.len()
    }

    /// Whether no site is modelled
    pub const fn is_empty(&self) -> bool {
        self.site_ids.is_empty()
    }

    /// Observed detection proportions
    pub fn proportions(&self) -> Vec<f64> {
        self.successes
            .iter()
            .zip(&self.trials)
            .map(|(&s, &n)| s as f64 / n as f64)
            .collect()
    }

    /// Z-score every continuous covariate in place
    ///
    /// Coefficients of the standardised covariates are then in standard-deviation
    /// units and directly comparable.
    ///
    /// # Errors
    ///
    /// Returns an error if a covariate is constant across sites
    pub fn standardize(&mut self) -> Result<()> {
        for (name, values) in &mut self.continuous {
            let (scaled, mean, sd) = z_scores(values).ok_or_else(|| {
                computation_error(
                    "standardize",
                    &format!("covariate '{name}' is constant across sites"),
                )
            })?;
            *values = scaled;
            self.scaling.insert(name.clone(), Scaling { mean, sd });
        }
        Ok(())
    }

    /// Model matrix for `terms`: intercept, continuous columns, treatment-coded factors
    ///
    /// Factor levels are sorted and the first is the reference level; dummy
    /// columns are named `<factor><level>`.
    ///
    /// # Errors
    ///
    /// Returns an error if a term wasn't assembled into this table
    pub fn design_matrix(&self, terms: &[String]) -> Result<DesignMatrix> {
        let n = self.len();
        let mut names = vec!["(Intercept)".to_string()];
        let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n]];

        for term in terms {
            if let Some((_, values)) = self.continuous.iter().find(|(name, _)| name == term) {
                names.push(term.clone());
                columns.push(values.clone());
            } else if let Some((_, levels)) = self.factors.iter().find(|(name, _)| name == term) {
                let distinct: BTreeSet<&str> = levels.iter().map(String::as_str).collect();
                for level in distinct.into_iter().skip(1) {
                    names.push(format!("{term}{level}"));
                    columns.push(
                        levels
                            .iter()
                            .map(|l| if l == level { 1.0 } else { 0.0 })
                            .collect(),
                    );
                }
            } else {
                return Err(invalid_data(&format!(
                    "term '{term}' is not in the covariate table for '{}'",
                    self.species
                )));
            }
        }

        let p = columns.len();
        let mut matrix = Array2::<f64>::zeros((n, p));
        for (j, column) in columns.iter().enumerate() {
            for (i, value) in column.iter().enumerate() {
                if let Some(cell) = matrix.get_mut((i, j)) {
                    *cell = *value;
                }
            }
        }
        Ok(DesignMatrix {
            matrix,
            columns: names,
        })
    }

    /// Table view with response, proportion and (possibly scaled) covariates
    ///
    /// # Errors
    ///
    /// Returns an error if the frame can't be assembled
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new("site_id".into(), self.site_ids.clone()),
            Column::new("detected_days".into(), self.successes.clone()),
            Column::new("sampled_days".into(), self.trials.clone()),
            Column::new("proportion".into(), self.proportions()),
        ];
        for (name, values) in &self.continuous {
            columns.push(Column::new(name.as_str().into(), values.clone()));
        }
        for (name, levels) in &self.factors {
            columns.push(Column::new(name.as_str().into(), levels.clone()));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Write [`Self::to_frame`] as CSV
    ///
    /// # Errors
    ///
    /// Returns an error if the frame can't be assembled or written
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut frame = self.to_frame()?;
        write_csv(path, &mut frame)
    }
}
