//! Baseline predictor shims
//!
//! Technical-indicator estimators standing in for trained models. Each one
//! reads the supplied feature vector only, scales its view to the requested
//! horizon, and reports a confidence derived from how decisive its
//! indicator currently is. They exist so the registry always has something
//! to ensemble; substituting a trained model is a matter of registering a
//! different [`Predictor`](super::Predictor).

use super::Predictor;
use crate::error::Result;
use crate::types::{FeatureVector, Horizon, ModelArchitecture, ModelPrediction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Per-horizon scale for a one-day-calibrated estimate. Square-root time
/// scaling, the standard diffusion assumption.
fn horizon_scale(horizon: Horizon) -> f64 {
    (horizon.hours() / 24.0).sqrt()
}

fn prediction(
    model_id: &str,
    architecture: ModelArchitecture,
    features: &FeatureVector,
    horizon: Horizon,
    predicted_return: f64,
    confidence: f64,
) -> ModelPrediction {
    ModelPrediction {
        model_id: model_id.to_string(),
        architecture,
        horizon,
        predicted_return,
        price_target: features.price * (1.0 + predicted_return),
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Extrapolates the short-window momentum reading
pub struct MomentumPredictor {
    /// Cap on the extrapolated per-horizon return
    max_return: f64,
}

impl MomentumPredictor {
    pub fn new() -> Self {
        Self { max_return: 0.10 }
    }
}

impl Default for MomentumPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for MomentumPredictor {
    fn model_id(&self) -> &str {
        "momentum_baseline"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::Momentum
    }

    fn predict(&self, features: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction> {
        let scaled = features.momentum * horizon_scale(horizon);
        let predicted_return = scaled.clamp(-self.max_return, self.max_return);
        // Decisive momentum reads earn higher confidence, tapering in
        // high volatility where continuation is less reliable.
        let decisiveness = (features.momentum.abs() * 20.0).min(1.0);
        let vol_damp = 1.0 - (features.volatility * 2.0).min(0.5);
        let confidence = 0.3 + 0.6 * decisiveness * vol_damp;

        Ok(prediction(
            self.model_id(),
            self.architecture(),
            features,
            horizon,
            predicted_return,
            confidence,
        ))
    }
}

/// RSI and Bollinger mean-reversion estimator
pub struct MeanReversionPredictor {
    /// Return assigned to a fully stretched indicator
    full_stretch_return: f64,
}

impl MeanReversionPredictor {
    pub fn new() -> Self {
        Self {
            full_stretch_return: 0.03,
        }
    }
}

impl Default for MeanReversionPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for MeanReversionPredictor {
    fn model_id(&self) -> &str {
        "mean_reversion_baseline"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::MeanReversion
    }

    fn predict(&self, features: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction> {
        // Stretch in [-1, 1]: positive means oversold, expecting a bounce
        let rsi_stretch = (50.0 - features.rsi) / 50.0;
        let band_stretch = 0.5 - features.bollinger.position(features.price);
        let stretch = (rsi_stretch + 2.0 * band_stretch) / 2.0;

        let predicted_return =
            (stretch * self.full_stretch_return * horizon_scale(horizon)).clamp(-0.08, 0.08);
        // Confidence peaks at the extremes, same shape the RSI carries
        let confidence = 0.25 + 0.65 * stretch.abs().min(1.0);

        Ok(prediction(
            self.model_id(),
            self.architecture(),
            features,
            horizon,
            predicted_return,
            confidence,
        ))
    }
}

/// MACD and moving-average trend follower
pub struct TrendPredictor {
    macd_sensitivity: f64,
}

impl TrendPredictor {
    pub fn new() -> Self {
        Self {
            macd_sensitivity: 2.0,
        }
    }
}

impl Default for TrendPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for TrendPredictor {
    fn model_id(&self) -> &str {
        "trend_baseline"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::Trend
    }

    fn predict(&self, features: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction> {
        let price = features.price.max(f64::EPSILON);
        let macd_norm = (features.macd / price) * self.macd_sensitivity;
        let ma_gap = (features.sma_20 - features.sma_50) / price;
        let ema_gap = (features.ema_12 - features.ema_26) / price;

        let trend = macd_norm + ma_gap + ema_gap;
        let predicted_return = (trend * horizon_scale(horizon)).clamp(-0.08, 0.08);

        // All three trend reads agreeing in sign is the strong case
        let aligned = macd_norm.signum() == ma_gap.signum()
            && ma_gap.signum() == ema_gap.signum()
            && trend.abs() > 1e-6;
        let base = (trend.abs() * 50.0).min(1.0);
        let confidence = if aligned { 0.4 + 0.5 * base } else { 0.25 + 0.35 * base };

        Ok(prediction(
            self.model_id(),
            self.architecture(),
            features,
            horizon,
            predicted_return,
            confidence,
        ))
    }
}

/// Seeded stochastic shim, reproducing the placeholder "random model"
/// behavior of early pipelines while staying a pure function of its
/// inputs: the seed is derived from the feature snapshot itself, so
/// identical inputs give identical output.
pub struct StochasticPredictor {
    dispersion: f64,
}

impl StochasticPredictor {
    pub fn new() -> Self {
        Self { dispersion: 0.01 }
    }

    fn seed_for(features: &FeatureVector, horizon: Horizon) -> u64 {
        let mut hasher = DefaultHasher::new();
        features.symbol.hash(&mut hasher);
        features.timestamp.timestamp_millis().hash(&mut hasher);
        features.price.to_bits().hash(&mut hasher);
        horizon.as_str().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for StochasticPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for StochasticPredictor {
    fn model_id(&self) -> &str {
        "stochastic_baseline"
    }

    fn architecture(&self) -> ModelArchitecture {
        ModelArchitecture::Stochastic
    }

    fn predict(&self, features: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction> {
        let mut rng = StdRng::seed_from_u64(Self::seed_for(features, horizon));
        let noise: f64 = rng.random_range(-1.0..1.0);
        let drift = features.momentum * 0.5 * horizon_scale(horizon);
        let predicted_return = drift + noise * self.dispersion * horizon_scale(horizon);

        Ok(prediction(
            self.model_id(),
            self.architecture(),
            features,
            horizon,
            predicted_return,
            // A noise model never deserves much weight in the ensemble
            0.35,
        ))
    }
}
