//! Horizon and cross-horizon ensembling
//!
//! Two stages. The horizon ensembler collapses the surviving model
//! predictions for one horizon into a single estimate, renormalizing the
//! static weights over survivors so they always sum to 1. The cross-horizon
//! ensembler then collapses the available horizon estimates into one
//! symbol-level estimate using a base importance table that favors
//! near-term windows, again renormalized over what actually arrived.
//!
//! Confidence at the horizon level is the weighted mean of model
//! confidences, penalized by disagreement between the models. At the
//! symbol level it additionally carries a coverage penalty so that a run
//! with failed horizons always reports strictly lower confidence than the
//! same run with every horizon available.

use crate::config::EnsembleConfig;
use crate::predictor::SurvivorSet;
use crate::types::{Horizon, HorizonPrediction};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Symbol-level combination of the available horizon estimates
#[derive(Debug, Clone)]
pub struct CrossHorizonEstimate {
    pub ensemble_return: f64,
    pub confidence: f64,
    /// Share of the requested horizon importance that was available
    pub coverage: f64,
    pub horizons_used: usize,
}

pub struct HorizonEnsembler<'a> {
    config: &'a EnsembleConfig,
}

impl<'a> HorizonEnsembler<'a> {
    pub fn new(config: &'a EnsembleConfig) -> Self {
        Self { config }
    }

    /// Weighted mean of the survivors, or `None` when the horizon is
    /// unavailable (zero survivors). Unavailability is not an error; the
    /// horizon is simply excluded downstream.
    pub fn combine(
        &self,
        horizon: Horizon,
        survivors: &SurvivorSet,
        timestamp: DateTime<Utc>,
    ) -> Option<HorizonPrediction> {
        if survivors.is_empty() {
            debug!(horizon = %horizon, "no surviving predictions, horizon unavailable");
            return None;
        }

        let total_weight: f64 = survivors.weights.iter().sum();
        debug_assert!(total_weight > 0.0);
        let normalized: Vec<f64> = survivors
            .weights
            .iter()
            .map(|w| w / total_weight)
            .collect();

        let ensemble_return: f64 = survivors
            .predictions
            .iter()
            .zip(&normalized)
            .map(|(p, w)| p.predicted_return * w)
            .sum();

        let weighted_confidence: f64 = survivors
            .predictions
            .iter()
            .zip(&normalized)
            .map(|(p, w)| p.confidence * w)
            .sum();

        let confidence = self.agreement_penalized(
            weighted_confidence,
            ensemble_return,
            &survivors.predictions.iter().map(|p| p.predicted_return).collect::<Vec<_>>(),
            &normalized,
        );

        Some(HorizonPrediction {
            horizon,
            predictions: survivors.predictions.clone(),
            ensemble_return,
            confidence,
            degraded: survivors.degraded(),
            timestamp,
        })
    }

    /// Penalize confidence by the normalized cross-model variance: full
    /// agreement keeps the weighted confidence, heavy disagreement drives
    /// it toward zero. Capped so ensemble confidence never claims
    /// certainty.
    fn agreement_penalized(
        &self,
        weighted_confidence: f64,
        mean_return: f64,
        returns: &[f64],
        weights: &[f64],
    ) -> f64 {
        let variance: f64 = returns
            .iter()
            .zip(weights)
            .map(|(r, w)| w * (r - mean_return).powi(2))
            .sum();
        let scale = mean_return.powi(2) + self.config.variance_floor;
        let normalized_variance = (variance / scale).clamp(0.0, 1.0);

        (weighted_confidence * (1.0 - normalized_variance))
            .clamp(0.0, self.config.confidence_cap)
    }
}

pub struct CrossHorizonEnsembler<'a> {
    config: &'a EnsembleConfig,
}

impl<'a> CrossHorizonEnsembler<'a> {
    pub fn new(config: &'a EnsembleConfig) -> Self {
        Self { config }
    }

    /// Combine the available horizon estimates. `requested` is the full
    /// set the caller asked for; the gap between requested and available
    /// importance becomes the coverage penalty on confidence.
    pub fn combine(
        &self,
        available: &[HorizonPrediction],
        requested: &[Horizon],
    ) -> Option<CrossHorizonEstimate> {
        if available.is_empty() {
            return None;
        }

        let base_weight = |h: Horizon| -> f64 {
            self.config.horizon_weights.get(&h).copied().unwrap_or(0.0)
        };

        let requested_importance: f64 = requested.iter().map(|h| base_weight(*h)).sum();
        let available_importance: f64 =
            available.iter().map(|p| base_weight(p.horizon)).sum();
        if available_importance <= 0.0 || requested_importance <= 0.0 {
            return None;
        }

        let coverage = (available_importance / requested_importance).min(1.0);

        let mut ensemble_return = 0.0;
        let mut confidence = 0.0;
        for prediction in available {
            let w = base_weight(prediction.horizon) / available_importance;
            ensemble_return += w * prediction.ensemble_return;
            confidence += w * prediction.confidence;
        }

        Some(CrossHorizonEstimate {
            ensemble_return,
            confidence: (confidence * coverage).clamp(0.0, self.config.confidence_cap),
            coverage,
            horizons_used: available.len(),
        })
    }
}
