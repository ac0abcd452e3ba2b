//! Uncertainty quantification from cross-model dispersion
//!
//! Pools every surviving model return across all horizons for a symbol and
//! derives symmetric confidence intervals from the pooled mean and standard
//! deviation. Known limitation: this assumes approximately Gaussian
//! dispersion across models and horizons; fat-tailed disagreement will
//! understate the true intervals.

use crate::types::{HorizonPrediction, Interval, UncertaintyBounds};

/// z-scores for the published interval levels
const Z_68: f64 = 1.0;
const Z_95: f64 = 1.96;
const Z_99: f64 = 2.58;
const Z_PREDICTION: f64 = 2.0;

/// Derive uncertainty bounds from the pooled per-model returns of all
/// available horizons. With fewer than two pooled returns the dispersion
/// is zero and every interval collapses onto the mean.
pub fn quantify(horizons: &[HorizonPrediction]) -> UncertaintyBounds {
    let returns: Vec<f64> = horizons
        .iter()
        .flat_map(|h| h.predictions.iter().map(|p| p.predicted_return))
        .collect();
    from_returns(&returns)
}

/// Bounds from an explicit pool of returns
pub fn from_returns(returns: &[f64]) -> UncertaintyBounds {
    let n = returns.len();
    if n == 0 {
        return UncertaintyBounds {
            standard_error: 0.0,
            interval_68: Interval { lower: 0.0, upper: 0.0 },
            interval_95: Interval { lower: 0.0, upper: 0.0 },
            interval_99: Interval { lower: 0.0, upper: 0.0 },
            prediction_interval: Interval { lower: 0.0, upper: 0.0 },
            sample_size: 0,
        };
    }

    let mean = returns.iter().sum::<f64>() / n as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
    let sigma = variance.sqrt();
    let standard_error = sigma / (n as f64).sqrt();

    let interval = |z: f64| Interval {
        lower: mean - z * sigma,
        upper: mean + z * sigma,
    };

    UncertaintyBounds {
        standard_error,
        interval_68: interval(Z_68),
        interval_95: interval(Z_95),
        interval_99: interval(Z_99),
        prediction_interval: interval(Z_PREDICTION),
        sample_size: n,
    }
}
