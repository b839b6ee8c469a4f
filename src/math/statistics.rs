//! Summary statistics for covariate columns

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with the `n - 1` denominator
///
/// `None` for fewer than two values.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Centre and scale values to zero mean and unit sample variance
///
/// Returns the scaled values with the mean and standard deviation used, or
/// `None` when the values are constant or fewer than two.
pub fn z_scores(values: &[f64]) -> Option<(Vec<f64>, f64, f64)> {
    let m = mean(values)?;
    let sd = sample_sd(values)?;
    if sd <= f64::EPSILON * m.abs().max(1.0) {
        return None;
    }
    Some((values.iter().map(|v| (v - m) / sd).collect(), m, sd))
}
