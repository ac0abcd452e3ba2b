//! Predictor capability and registry
//!
//! The engine never trains or selects models; each estimator is a pluggable
//! black box behind the [`Predictor`] trait. The registry pairs every
//! registered predictor with a static (architecture, horizon) weight from
//! configuration, calls them all for a horizon, and drops any prediction
//! that errors or produces non-finite output. A dropped predictor is a
//! degraded ensemble, never a failed pipeline.

pub mod baselines;

pub use baselines::{
    MeanReversionPredictor, MomentumPredictor, StochasticPredictor, TrendPredictor,
};

use crate::config::ModelWeights;
use crate::error::Result;
use crate::types::{FeatureVector, Horizon, ModelPrediction};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// A single return estimator. `predict` must be a pure function of its
/// inputs: identical features and horizon yield an identical prediction.
pub trait Predictor: Send + Sync {
    /// Stable identifier used in logs and audit records
    fn model_id(&self) -> &str;

    fn architecture(&self) -> crate::types::ModelArchitecture;

    fn predict(&self, features: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction>;
}

/// Predictions that survived the boundary checks for one horizon, paired
/// with their static weights (not yet renormalized)
#[derive(Debug, Clone, Default)]
pub struct SurvivorSet {
    pub predictions: Vec<ModelPrediction>,
    pub weights: Vec<f64>,
    /// Registered predictors whose output was dropped
    pub dropped: usize,
}

impl SurvivorSet {
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn degraded(&self) -> bool {
        self.dropped > 0
    }
}

/// Holds the pluggable estimators behind the capability trait
pub struct PredictorRegistry {
    predictors: RwLock<Vec<Arc<dyn Predictor>>>,
}

impl PredictorRegistry {
    pub fn new() -> Self {
        Self {
            predictors: RwLock::new(Vec::new()),
        }
    }

    /// Registry preloaded with the baseline technical shims
    pub fn with_baselines() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(MomentumPredictor::new()));
        registry.register(Arc::new(MeanReversionPredictor::new()));
        registry.register(Arc::new(TrendPredictor::new()));
        registry.register(Arc::new(StochasticPredictor::new()));
        registry
    }

    pub fn register(&self, predictor: Arc<dyn Predictor>) {
        self.predictors.write().push(predictor);
    }

    pub fn len(&self) -> usize {
        self.predictors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictors.read().is_empty()
    }

    /// Run every registered predictor for one horizon. Failures and
    /// non-finite outputs are dropped with a warning; zero-weight
    /// predictors are skipped outright.
    pub fn predict_horizon(
        &self,
        features: &FeatureVector,
        horizon: Horizon,
        weights: &ModelWeights,
    ) -> SurvivorSet {
        let predictors = self.predictors.read();
        let mut survivors = SurvivorSet::default();

        for predictor in predictors.iter() {
            let weight = weights.weight(predictor.architecture(), horizon);
            if weight <= 0.0 {
                continue;
            }
            match predictor.predict(features, horizon) {
                Ok(prediction) if prediction.is_valid() => {
                    survivors.predictions.push(prediction);
                    survivors.weights.push(weight);
                }
                Ok(prediction) => {
                    warn!(
                        model_id = predictor.model_id(),
                        horizon = %horizon,
                        predicted_return = prediction.predicted_return,
                        "dropping non-finite prediction"
                    );
                    survivors.dropped += 1;
                }
                Err(err) => {
                    warn!(
                        model_id = predictor.model_id(),
                        horizon = %horizon,
                        error = %err,
                        "predictor failed, excluding from ensemble"
                    );
                    survivors.dropped += 1;
                }
            }
        }

        survivors
    }
}

impl Default for PredictorRegistry {
    fn default() -> Self {
        Self::with_baselines()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FailingPredictor, StubPredictor};
    use super::*;
    use crate::types::{BollingerBands, ModelArchitecture};
    use chrono::Utc;

    fn features() -> FeatureVector {
        FeatureVector {
            symbol: "AAPL".into(),
            timestamp: Utc::now(),
            price: 150.0,
            volume: 1_000_000.0,
            rsi: 55.0,
            macd: 1.0,
            bollinger: BollingerBands {
                upper: 155.0,
                middle: 150.0,
                lower: 145.0,
            },
            sma_20: 149.0,
            sma_50: 147.0,
            ema_12: 150.5,
            ema_26: 148.5,
            support: 140.0,
            resistance: 160.0,
            volatility: 0.02,
            momentum: 0.01,
        }
    }

    #[test]
    fn test_all_survive() {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "a".into(),
            architecture: ModelArchitecture::Momentum,
            predicted_return: 0.02,
            confidence: 0.8,
        }));
        registry.register(Arc::new(StubPredictor {
            id: "b".into(),
            architecture: ModelArchitecture::Trend,
            predicted_return: 0.015,
            confidence: 0.75,
        }));

        let weights = ModelWeights::default();
        let survivors = registry.predict_horizon(&features(), Horizon::OneDay, &weights);
        assert_eq!(survivors.predictions.len(), 2);
        assert_eq!(survivors.dropped, 0);
        assert!(!survivors.degraded());
    }

    #[test]
    fn test_failing_predictor_dropped_not_fatal() {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "ok".into(),
            architecture: ModelArchitecture::Momentum,
            predicted_return: 0.02,
            confidence: 0.8,
        }));
        registry.register(Arc::new(FailingPredictor {
            architecture: ModelArchitecture::Trend,
        }));

        let survivors =
            registry.predict_horizon(&features(), Horizon::OneHour, &ModelWeights::default());
        assert_eq!(survivors.predictions.len(), 1);
        assert_eq!(survivors.dropped, 1);
        assert!(survivors.degraded());
    }

    #[test]
    fn test_non_finite_output_dropped() {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "nan".into(),
            architecture: ModelArchitecture::Momentum,
            predicted_return: f64::NAN,
            confidence: 0.8,
        }));

        let survivors =
            registry.predict_horizon(&features(), Horizon::OneHour, &ModelWeights::default());
        assert!(survivors.is_empty());
        assert_eq!(survivors.dropped, 1);
    }

    #[test]
    fn test_zero_weight_architecture_skipped() {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "stoch".into(),
            architecture: ModelArchitecture::Stochastic,
            predicted_return: 0.01,
            confidence: 0.5,
        }));

        let mut weights = ModelWeights::default();
        weights.base.insert(ModelArchitecture::Stochastic, 0.0);
        // Not a valid business config on its own, but the lookup path is
        // what is under test here.
        let survivors = registry.predict_horizon(&features(), Horizon::OneHour, &weights);
        assert!(survivors.is_empty());
        assert_eq!(survivors.dropped, 0);
    }

    #[test]
    fn test_baselines_produce_finite_output() {
        let registry = PredictorRegistry::with_baselines();
        let survivors =
            registry.predict_horizon(&features(), Horizon::OneDay, &ModelWeights::default());
        assert_eq!(survivors.predictions.len(), 4);
        for p in &survivors.predictions {
            assert!(p.is_valid());
        }
    }
}
