//! Binomial family with the canonical logit link

use statrs::function::factorial::ln_binomial;

// Keeps fitted probabilities away from 0 and 1 so weights stay finite
const PROBABILITY_EPSILON: f64 = f64::EPSILON;

/// Log-odds of a probability
pub fn logit(mu: f64) -> f64 {
    (mu / (1.0 - mu)).ln()
}

/// Probability for a linear predictor, clamped into the open unit interval
pub fn inverse_logit(eta: f64) -> f64 {
    let mu = if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    };
    mu.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON)
}

/// Derivative `dμ/dη` of the inverse logit
pub fn mu_eta(mu: f64) -> f64 {
    (mu * (1.0 - mu)).max(PROBABILITY_EPSILON)
}

/// Binomial variance function for a proportion
pub fn variance(mu: f64) -> f64 {
    mu * (1.0 - mu)
}

/// Deviance contribution of one site
///
/// `y` is the observed proportion, `n` the number of trials.
pub fn unit_deviance(y: f64, mu: f64, n: f64) -> f64 {
    let term = |a: f64, b: f64| if a > 0.0 { a * (a / b).ln() } else { 0.0 };
    2.0 * n * (term(y, mu) + term(1.0 - y, 1.0 - mu))
}

/// Binomial log-likelihood of `successes` out of `trials` at probability `mu`
///
/// Includes the binomial coefficient, so values are comparable across models
/// fitted to the same data and AIC matches the customary GLM output.
pub fn log_likelihood(successes: u64, trials: u64, mu: f64) -> f64 {
    let k = successes as f64;
    let n = trials as f64;
    let mut ll = ln_binomial(trials, successes);
    if successes > 0 {
        ll += k * mu.ln();
    }
    if trials > successes {
        ll += (n - k) * (1.0 - mu).ln();
    }
    ll
}
