//! Tests for the binomial family and logit link

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use camtrap::model::family::{
        inverse_logit, log_likelihood, logit, mu_eta, unit_deviance, variance,
    };

    // Tests the link and its inverse agree
    // Verified by using the probit link
    #[test]
    fn test_logit_inverse() {
        assert_abs_diff_eq!(logit(0.5), 0.0);
        assert_relative_eq!(logit(0.75), 3.0_f64.ln());
        for eta in [-4.0, -0.3, 0.0, 2.5] {
            assert_abs_diff_eq!(logit(inverse_logit(eta)), eta, epsilon = 1e-12);
        }
    }

    // Tests extreme predictors stay strictly inside the unit interval
    // Verified by letting the probability reach one
    #[test]
    fn test_inverse_logit_clamped() {
        let high = inverse_logit(800.0);
        let low = inverse_logit(-800.0);
        assert!(high < 1.0);
        assert!(low > 0.0);
        assert!(mu_eta(high) > 0.0);
    }

    // Tests the derivative equals the variance for the canonical link
    // Verified by returning the variance squared
    #[test]
    fn test_mu_eta_and_variance() {
        assert_relative_eq!(mu_eta(0.2), 0.16);
        assert_relative_eq!(variance(0.2), 0.16);
    }

    // Tests unit deviance vanishes at a perfect fit and handles 0 and 1
    // Verified by evaluating 0 * ln(0) as NaN
    #[test]
    fn test_unit_deviance() {
        assert_abs_diff_eq!(unit_deviance(0.3, 0.3, 10.0), 0.0);
        assert_relative_eq!(unit_deviance(0.0, 0.5, 4.0), 8.0 * 2.0_f64.ln());
        assert_relative_eq!(unit_deviance(1.0, 0.5, 4.0), 8.0 * 2.0_f64.ln());
        assert!(unit_deviance(0.5, 0.2, 4.0) > 0.0);
    }

    // Tests the log-likelihood includes the binomial coefficient
    // Verified by dropping ln C(n, k)
    #[test]
    fn test_log_likelihood() {
        assert_relative_eq!(
            log_likelihood(2, 4, 0.5),
            6.0_f64.ln() + 4.0 * 0.5_f64.ln(),
            epsilon = 1e-12
        );
        assert_relative_eq!(log_likelihood(0, 3, 0.1), 3.0 * 0.9_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(log_likelihood(3, 3, 0.1), 3.0 * 0.1_f64.ln(), epsilon = 1e-12);
    }
}
