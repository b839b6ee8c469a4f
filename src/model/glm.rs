//! Binomial GLM with logit link fitted by iteratively reweighted least squares
//!
//! Each site contributes `successes` detection days out of `trials` sampled
//! days. Starting values, the convergence rule and the reported statistics
//! follow the customary GLM conventions so results line up with standard
//! statistical software.

use crate::io::configuration::{IRLS_MAX_ITERATIONS, IRLS_TOLERANCE};
use crate::io::error::{CamtrapError, Result, computation_error, invalid_data};
use crate::math::linalg::{cholesky, cholesky_solve, spd_inverse};
use crate::model::family::{inverse_logit, log_likelihood, logit, mu_eta, unit_deviance, variance};
use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, trace};

/// Stopping rule for the IRLS loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrlsConfig {
    /// Iteration limit before reporting non-convergence
    pub max_iterations: usize,
    /// Relative deviance change regarded as converged
    pub tolerance: f64,
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: IRLS_MAX_ITERATIONS,
            tolerance: IRLS_TOLERANCE,
        }
    }
}

/// Model matrix with named columns
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// One row per site, one column per coefficient
    pub matrix: Array2<f64>,
    /// Coefficient names in column order
    pub columns: Vec<String>,
}

impl DesignMatrix {
    /// Number of observations
    pub fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients
    pub fn n_columns(&self) -> usize {
        self.matrix.ncols()
    }
}

/// One estimated coefficient with its Wald test
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    /// Column name
    pub name: String,
    /// Estimate on the log-odds scale
    pub estimate: f64,
    /// Standard error
    pub std_error: f64,
    /// Wald z statistic
    pub z_value: f64,
    /// Two-sided p-value under the standard normal
    pub p_value: f64,
}

/// A converged binomial GLM
#[derive(Debug, Clone)]
pub struct FittedModel {
    /// Model name
    pub name: String,
    /// Formula text
    pub formula: String,
    /// Coefficients in design-matrix column order
    pub coefficients: Vec<Coefficient>,
    /// Fitted detection probability per observation
    pub fitted: Vec<f64>,
    /// Residual deviance
    pub deviance: f64,
    /// Deviance of the intercept-only model on the same data
    pub null_deviance: f64,
    /// Residual degrees of freedom
    pub df_residual: usize,
    /// Null degrees of freedom
    pub df_null: usize,
    /// Maximised log-likelihood
    pub log_likelihood: f64,
    /// Akaike information criterion
    pub aic: f64,
    /// IRLS iterations used
    pub iterations: usize,
    /// Number of observations
    pub n_obs: usize,
}

impl FittedModel {
    /// Number of estimated parameters
    pub const fn n_parameters(&self) -> usize {
        self.coefficients.len()
    }

    /// Coefficient by column name
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Predicted probabilities for new rows
    ///
    /// # Errors
    ///
    /// Returns an error if the design columns differ from the fitted ones
    pub fn predict(&self, design: &DesignMatrix) -> Result<Vec<f64>> {
        let expected: Vec<&str> = self.coefficients.iter().map(|c| c.name.as_str()).collect();
        let found: Vec<&str> = design.columns.iter().map(String::as_str).collect();
        if expected != found {
            return Err(invalid_data(&format!(
                "model '{}' expects columns {expected:?}, got {found:?}",
                self.name
            )));
        }
        let beta: Array1<f64> = self.coefficients.iter().map(|c| c.estimate).collect();
        Ok(design.matrix.dot(&beta).iter().map(|&eta| inverse_logit(eta)).collect())
    }
}

fn total_deviance(y: &Array1<f64>, mu: &Array1<f64>, n: &Array1<f64>) -> f64 {
    ndarray::Zip::from(y)
        .and(mu)
        .and(n)
        .fold(0.0, |acc, &y, &mu, &n| acc + unit_deviance(y, mu, n))
}

/// Fit a binomial logit model
///
/// # Errors
///
/// Returns an error if the inputs disagree in length, a site has no trials or
/// more successes than trials, the design is rank deficient, or the iteration
/// limit is reached before convergence
pub fn fit_binomial(
    name: &str,
    formula: &str,
    design: &DesignMatrix,
    successes: &[u64],
    trials: &[u64],
    config: &IrlsConfig,
) -> Result<FittedModel> {
    let n_obs = design.n_rows();
    let p = design.n_columns();
    if successes.len() != n_obs || trials.len() != n_obs {
        return Err(invalid_data(&format!(
            "model '{name}': {n_obs} design rows but {} successes and {} trials",
            successes.len(),
            trials.len()
        )));
    }
    if let Some((s, n)) = successes.iter().zip(trials).find(|(s, n)| **n == 0 || s > n) {
        return Err(invalid_data(&format!(
            "model '{name}': invalid response {s} of {n} trials"
        )));
    }
    if n_obs <= p {
        return Err(computation_error(
            "fit_binomial",
            &format!("model '{name}' has {p} coefficients but only {n_obs} sites"),
        ));
    }

    let x = &design.matrix;
    let n: Array1<f64> = trials.iter().map(|&t| t as f64).collect();
    let y: Array1<f64> = successes
        .iter()
        .zip(trials)
        .map(|(&s, &t)| s as f64 / t as f64)
        .collect();

    let mut mu: Array1<f64> = ndarray::Zip::from(&y)
        .and(&n)
        .map_collect(|&y, &n| (n * y + 0.5) / (n + 1.0));
    let mut eta = mu.mapv(logit);
    let mut deviance = total_deviance(&y, &mu, &n);
    let mut weights = Array1::<f64>::zeros(n_obs);
    let mut beta = Array1::<f64>::zeros(p);
    let singular = |e: CamtrapError| {
        computation_error(
            "fit_binomial",
            &format!("model '{name}' has a singular design ({e})"),
        )
    };

    let mut converged = None;
    let mut last_change = f64::INFINITY;
    for iteration in 1..=config.max_iterations {
        let gradient = mu.mapv(mu_eta);
        let z = &eta + &((&y - &mu) / &gradient);
        weights = ndarray::Zip::from(&n)
            .and(&gradient)
            .and(&mu)
            .map_collect(|&n, &g, &mu| n * g * g / variance(mu).max(f64::EPSILON));

        let weighted = x * &weights.view().insert_axis(Axis(1));
        let xtwx = x.t().dot(&weighted);
        let xtwz = weighted.t().dot(&z);
        let factor = cholesky(&xtwx).map_err(singular)?;
        beta = cholesky_solve(&factor, &xtwz);

        eta = x.dot(&beta);
        mu = eta.mapv(inverse_logit);
        let previous = deviance;
        deviance = total_deviance(&y, &mu, &n);
        last_change = (deviance - previous).abs() / (deviance.abs() + 0.1);
        trace!(model = name, iteration, deviance, last_change, "irls step");

        if !deviance.is_finite() {
            return Err(computation_error(
                "fit_binomial",
                &format!("model '{name}' produced a non-finite deviance"),
            ));
        }
        if last_change < config.tolerance {
            converged = Some(iteration);
            break;
        }
    }

    let Some(iterations) = converged else {
        return Err(CamtrapError::NonConvergence {
            model: name.to_string(),
            iterations: config.max_iterations,
            last_change,
        });
    };

    let weighted = x * &weights.view().insert_axis(Axis(1));
    let covariance = spd_inverse(&x.t().dot(&weighted)).map_err(singular)?;
    let normal = Normal::new(0.0, 1.0).map_err(|e| computation_error("fit_binomial", &e))?;
    let coefficients = design
        .columns
        .iter()
        .zip(beta.iter())
        .enumerate()
        .map(|(j, (column, &estimate))| {
            let std_error = covariance.get((j, j)).copied().unwrap_or(f64::NAN).sqrt();
            let z_value = estimate / std_error;
            Coefficient {
                name: column.clone(),
                estimate,
                std_error,
                z_value,
                p_value: 2.0 * (1.0 - normal.cdf(z_value.abs())),
            }
        })
        .collect();

    let pooled = successes.iter().sum::<u64>() as f64 / n.sum();
    let null_mu = Array1::from_elem(n_obs, pooled);
    let null_deviance = total_deviance(&y, &null_mu, &n);
    let log_likelihood: f64 = successes
        .iter()
        .zip(trials)
        .zip(mu.iter())
        .map(|((&s, &t), &mu)| log_likelihood(s, t, mu))
        .sum();
    let aic = -2.0 * log_likelihood + 2.0 * p as f64;

    debug!(model = name, iterations, deviance, aic, "model converged");
    Ok(FittedModel {
        name: name.to_string(),
        formula: formula.to_string(),
        coefficients,
        fitted: mu.to_vec(),
        deviance,
        null_deviance,
        df_residual: n_obs - p,
        df_null: n_obs - 1,
        log_likelihood,
        aic,
        iterations,
        n_obs,
    })
}
