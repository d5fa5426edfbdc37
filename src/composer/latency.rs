//! Lognormal conversion-lag model
//!
//! Fitted from two moments: μ = ln(median), σ = √(2·ln(mean/median)).
//! Completeness at age `a` days is the lognormal CDF, Φ((ln a − μ)/σ).

use serde::{Deserialize, Serialize};

use super::errors::{ComposeError, ComposeResult};

/// Lower bound on σ; a degenerate (mean <= median) fit uses it
pub const SIGMA_FLOOR: f64 = 0.1;

/// z-score of the 95th percentile
const Z_95: f64 = 1.645;

/// Lag parameters as configured per parameter id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyConfig {
    pub median_lag_days: f64,
    pub mean_lag_days: f64,
}

impl LatencyConfig {
    pub fn model(&self) -> ComposeResult<LatencyModel> {
        LatencyModel::from_lags(self.median_lag_days, self.mean_lag_days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyModel {
    mu: f64,
    sigma: f64,
}

impl LatencyModel {
    pub fn from_lags(median_lag_days: f64, mean_lag_days: f64) -> ComposeResult<Self> {
        let valid = |x: f64| x.is_finite() && x > 0.0;
        if !valid(median_lag_days) || !valid(mean_lag_days) {
            return Err(ComposeError::InvalidLatency {
                median: median_lag_days,
                mean: mean_lag_days,
            });
        }

        let ratio = mean_lag_days / median_lag_days;
        let sigma = if ratio > 1.0 {
            (2.0 * ratio.ln()).sqrt()
        } else {
            0.0
        };

        Ok(Self {
            mu: median_lag_days.ln(),
            sigma: sigma.max(SIGMA_FLOOR),
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Share of eventual conversions observed by `age_days`
    pub fn completeness(&self, age_days: f64) -> f64 {
        if age_days <= 0.0 {
            return 0.0;
        }
        std_normal_cdf((age_days.ln() - self.mu) / self.sigma)
    }

    /// Age by which 95% of conversions have landed
    pub fn t95(&self) -> f64 {
        (self.mu + Z_95 * self.sigma).exp()
    }

    pub fn is_mature(&self, age_days: f64) -> bool {
        age_days >= self.t95()
    }
}

fn std_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz and Stegun 7.1.26; absolute error below 1.5e-7
fn erf(x: f64) -> f64 {
    const P: f64 = 0.327_591_1;
    const A: [f64; 5] = [
        0.254_829_592,
        -0.284_496_736,
        1.421_413_741,
        -1.453_152_027,
        1.061_405_429,
    ];

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, a| acc * t + a) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_complete_at_median() {
        let model = LatencyModel::from_lags(4.0, 6.0).unwrap();
        assert!((model.completeness(4.0) - 0.5).abs() < 1e-6);
        assert!(model.completeness(1.0) < 0.5);
        assert!(model.completeness(30.0) > 0.9);
        assert_eq!(model.completeness(0.0), 0.0);
    }

    #[test]
    fn test_sigma_floor() {
        let model = LatencyModel::from_lags(3.0, 3.0).unwrap();
        assert_eq!(model.sigma(), SIGMA_FLOOR);
        let skewed = LatencyModel::from_lags(3.0, 2.0).unwrap();
        assert_eq!(skewed.sigma(), SIGMA_FLOOR);
    }

    #[test]
    fn test_t95() {
        let model = LatencyModel::from_lags(1.0, 1.0).unwrap();
        assert!((model.t95() - (0.1645f64).exp()).abs() < 1e-12);
        assert!(model.is_mature(2.0));
        assert!(!model.is_mature(1.0));
        assert!((model.completeness(model.t95()) - 0.95).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_lags() {
        let err = LatencyModel::from_lags(0.0, 2.0).unwrap_err();
        assert_eq!(err.code(), "DQ_INVALID_LATENCY");
        assert!(LatencyModel::from_lags(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_erf_symmetry() {
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
    }
}
