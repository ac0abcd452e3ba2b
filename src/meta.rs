//! Meta-learner calibration
//!
//! Final stage. Scales the resolved signal's confidence by a meta score
//! built from pipeline-reliability features: how accurate this symbol's
//! predictions have been historically, and how consistent the timeframes
//! were this round. Confidence is hard-capped below 1 to reserve headroom
//! for irreducible model risk. Strength scales by the same factor. A
//! risk-locked input stays a capped HOLD no matter what the meta features
//! say.

use crate::config::MetaConfig;
use crate::types::{MetaFeatures, SignalClass, TradingSignal};
use tracing::debug;

pub struct MetaLearner<'a> {
    config: &'a MetaConfig,
}

impl<'a> MetaLearner<'a> {
    pub fn new(config: &'a MetaConfig) -> Self {
        Self { config }
    }

    /// Reliability score in [0, 1] from the supplied meta features
    pub fn meta_score(&self, features: &MetaFeatures) -> f64 {
        ((features.historical_accuracy + features.timeframe_consistency) / 2.0).clamp(0.0, 1.0)
    }

    /// Produce the calibrated final signal. Returns a new record; the
    /// resolved input is left untouched.
    pub fn calibrate(&self, resolved: &TradingSignal, features: &MetaFeatures) -> TradingSignal {
        let mut calibrated = resolved.clone();

        if resolved.risk_locked {
            // The risk stage already pinned this; calibration must not
            // loosen it.
            calibrated.signal = SignalClass::Hold;
            calibrated.strength = calibrated.strength.min(0.3);
            calibrated.confidence = calibrated
                .confidence
                .min(self.config.confidence_ceiling);
            calibrated
                .reasoning
                .push_str("; meta calibration skipped (risk locked)");
            return calibrated;
        }

        let score = self.meta_score(features);
        let base_confidence = resolved.confidence;
        let final_confidence =
            (base_confidence * score).min(self.config.confidence_ceiling);

        let scale = if base_confidence > 0.0 {
            final_confidence / base_confidence
        } else {
            0.0
        };

        debug!(
            symbol = %resolved.symbol,
            score,
            base_confidence,
            final_confidence,
            "meta calibration applied"
        );

        calibrated.confidence = final_confidence;
        calibrated.strength = (resolved.strength * scale).clamp(0.0, 1.0);
        calibrated.reasoning.push_str(&format!(
            "; meta score {:.2} (accuracy {:.2}, consistency {:.2})",
            score, features.historical_accuracy, features.timeframe_consistency
        ));
        calibrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketRegime, SignalRiskMetrics};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn resolved(class: SignalClass, confidence: f64, strength: f64) -> TradingSignal {
        let now = Utc::now();
        TradingSignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            signal: class,
            strength,
            confidence,
            reasoning: "resolved".into(),
            risk_metrics: SignalRiskMetrics::default(),
            degraded: false,
            risk_locked: false,
            generated_at: now,
            valid_until: now + Duration::seconds(300),
        }
    }

    fn meta(accuracy: f64, consistency: f64) -> MetaFeatures {
        MetaFeatures {
            market_volatility: 0.2,
            signal_agreement: consistency,
            prediction_confidence: 0.7,
            historical_accuracy: accuracy,
            regime: MarketRegime::Sideways,
            timeframe_consistency: consistency,
        }
    }

    #[test]
    fn test_meta_score_is_average() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        assert!((learner.meta_score(&meta(0.7, 0.9)) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_scaled_and_capped() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        let signal = resolved(SignalClass::Buy, 0.8, 0.7);
        let out = learner.calibrate(&signal, &meta(1.0, 1.0));
        // Score 1.0 keeps confidence, ceiling still applies
        assert!((out.confidence - 0.8).abs() < 1e-12);

        let confident = resolved(SignalClass::StrongBuy, 1.0, 0.9);
        let capped = learner.calibrate(&confident, &meta(1.0, 1.0));
        assert_eq!(capped.confidence, 0.95);
    }

    #[test]
    fn test_strength_scales_proportionally() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        let signal = resolved(SignalClass::Buy, 0.8, 0.7);
        let out = learner.calibrate(&signal, &meta(0.6, 0.6));
        // Scale = 0.6
        assert!((out.confidence - 0.48).abs() < 1e-12);
        assert!((out.strength - 0.42).abs() < 1e-12);
    }

    #[test]
    fn test_default_accuracy_halves_confidence_roughly() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        let signal = resolved(SignalClass::Buy, 0.8, 0.7);
        // Unavailable analytics: accuracy defaults to 0.5
        let out = learner.calibrate(&signal, &meta(0.5, 1.0));
        assert!((out.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_risk_lock_is_final() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        let mut locked = resolved(SignalClass::Hold, 0.3, 0.3);
        locked.risk_locked = true;
        // Perfect meta features must not resurrect the signal
        let out = learner.calibrate(&locked, &meta(1.0, 1.0));
        assert_eq!(out.signal, SignalClass::Hold);
        assert!(out.strength <= 0.3);
        assert!(out.risk_locked);
    }

    #[test]
    fn test_zero_confidence_stays_zero() {
        let config = MetaConfig::default();
        let learner = MetaLearner::new(&config);
        let signal = resolved(SignalClass::Hold, 0.0, 0.0);
        let out = learner.calibrate(&signal, &meta(0.9, 0.9));
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.strength, 0.0);
    }
}
