//! Side-by-side comparison of the candidate models for one species
//!
//! Every model is reported; ranking by AIC is for reading convenience only and
//! nothing is selected automatically.

use crate::analysis::covariates::CovariateTable;
use crate::io::error::{Result, invalid_data};
use crate::io::table::write_csv;
use crate::model::formula::ModelSpec;
use crate::model::glm::{FittedModel, IrlsConfig, fit_binomial};
use polars::prelude::{Column, DataFrame};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// One line of the comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    /// Model name
    pub name: String,
    /// Formula text
    pub formula: String,
    /// Estimated parameters
    pub parameters: usize,
    /// Residual deviance
    pub deviance: f64,
    /// Akaike information criterion
    pub aic: f64,
    /// Difference from the smallest AIC
    pub delta_aic: f64,
    /// Akaike weight
    pub weight: f64,
}

/// All candidate models of one species fitted to the same sites
#[derive(Debug, Clone)]
pub struct ModelComparison {
    /// Species modelled
    pub species: String,
    /// Sites every model was fitted to
    pub n_sites: usize,
    /// Rows ordered by increasing AIC
    pub rows: Vec<ComparisonRow>,
    /// Fitted models in the same order as `rows`
    pub models: Vec<FittedModel>,
}

impl ModelComparison {
    /// Rank fitted models by AIC and compute Akaike weights
    ///
    /// Ties keep their input order.
    ///
    /// # Errors
    ///
    /// Returns an error if no model is given or the models were fitted to
    /// different numbers of sites
    pub fn from_models(species: &str, mut models: Vec<FittedModel>) -> Result<Self> {
        let n_sites = models
            .first()
            .map(|m| m.n_obs)
            .ok_or_else(|| invalid_data(&format!("no models to compare for '{species}'")))?;
        if let Some(other) = models.iter().find(|m| m.n_obs != n_sites) {
            return Err(invalid_data(&format!(
                "model '{}' was fitted to {} sites, expected {n_sites}",
                other.name, other.n_obs
            )));
        }

        models.sort_by(|a, b| a.aic.total_cmp(&b.aic));
        let best = models.first().map_or(0.0, |m| m.aic);
        let relative: Vec<f64> = models
            .iter()
            .map(|m| (-0.5 * (m.aic - best)).exp())
            .collect();
        let total: f64 = relative.iter().sum();

        let rows = models
            .iter()
            .zip(&relative)
            .map(|(m, &r)| ComparisonRow {
                name: m.name.clone(),
                formula: m.formula.clone(),
                parameters: m.n_parameters(),
                deviance: m.deviance,
                aic: m.aic,
                delta_aic: m.aic - best,
                weight: r / total,
            })
            .collect();

        Ok(Self {
            species: species.to_string(),
            n_sites,
            rows,
            models,
        })
    }

    /// Model with the smallest AIC
    pub fn best(&self) -> Option<&FittedModel> {
        self.models.first()
    }

    /// Comparison table as a frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame can't be assembled
    pub fn to_frame(&self) -> Result<DataFrame> {
        let column = |f: fn(&ComparisonRow) -> f64| self.rows.iter().map(f).collect::<Vec<_>>();
        Ok(DataFrame::new(vec![
            Column::new(
                "model".into(),
                self.rows.iter().map(|r| r.name.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "formula".into(),
                self.rows.iter().map(|r| r.formula.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                "k".into(),
                self.rows
                    .iter()
                    .map(|r| r.parameters as u32)
                    .collect::<Vec<_>>(),
            ),
            Column::new("deviance".into(), column(|r| r.deviance)),
            Column::new("aic".into(), column(|r| r.aic)),
            Column::new("delta_aic".into(), column(|r| r.delta_aic)),
            Column::new("weight".into(), column(|r| r.weight)),
        ])?)
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

    /// Plain-text report with a coefficient table per model
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Species: {} ({} sites)", self.species, self.n_sites);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<20} {:>3} {:>12} {:>12} {:>10} {:>8}",
            "model", "k", "deviance", "AIC", "dAIC", "weight"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<20} {:>3} {:>12.4} {:>12.4} {:>10.4} {:>8.4}",
                row.name, row.parameters, row.deviance, row.aic, row.delta_aic, row.weight
            );
        }

        for model in &self.models {
            let _ = writeln!(out);
            let _ = writeln!(out, "Model {}: successes/trials ~ {}", model.name, model.formula);
            let _ = writeln!(
                out,
                "{:<24} {:>12} {:>12} {:>9} {:>10}",
                "", "Estimate", "Std. Error", "z value", "Pr(>|z|)"
            );
            for c in &model.coefficients {
                let _ = writeln!(
                    out,
                    "{:<24} {:>12.6} {:>12.6} {:>9.3} {:>10.4e}",
                    c.name, c.estimate, c.std_error, c.z_value, c.p_value
                );
            }
            let _ = writeln!(
                out,
                "Null deviance: {:.4} on {} degrees of freedom",
                model.null_deviance, model.df_null
            );
            let _ = writeln!(
                out,
                "Residual deviance: {:.4} on {} degrees of freedom",
                model.deviance, model.df_residual
            );
            let _ = writeln!(
                out,
                "AIC: {:.4}  log-likelihood: {:.4}  IRLS iterations: {}",
                model.aic, model.log_likelihood, model.iterations
            );
        }
        out
    }
}

/// Fit every model to one species' covariate table and compare them
///
/// # Errors
///
/// Returns the first fitting error; a failed model aborts the comparison
pub fn compare_models(
    table: &CovariateTable,
    specs: &[ModelSpec],
    config: &IrlsConfig,
) -> Result<ModelComparison> {
    let models = specs
        .iter()
        .map(|spec| {
            let design = table.design_matrix(&spec.terms)?;
            fit_binomial(
                &spec.name,
                &spec.formula(),
                &design,
                &table.successes,
                &table.trials,
                config,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let comparison = ModelComparison::from_models(&table.species, models)?;
    if let Some(best) = comparison.best() {
        info!(
            species = %table.species,
            models = comparison.rows.len(),
            best = %best.name,
            aic = best.aic,
            "models compared"
        );
    }
    Ok(comparison)
}
