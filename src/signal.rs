//! Deterministic signal synthesis
//!
//! Maps (ensemble return, confidence, standard error) to a discrete signal
//! class with a fixed per-class strength. The mapping is pure: identical
//! inputs always produce the identical class, strength, and reasoning. The
//! reasoning string records which rule fired, which is an audit
//! requirement, not decoration.

use crate::config::SignalThresholds;
use crate::types::{SignalClass, SignalRiskMetrics, TradingSignal};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Pure synthesis outcome before the record wrapper is attached
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub signal: SignalClass,
    pub strength: f64,
    pub reasoning: String,
}

/// The core mapping. Uncertainty overrides direction: a standard error
/// past the ceiling forces HOLD no matter how attractive the return looks.
pub fn synthesize(
    thresholds: &SignalThresholds,
    ensemble_return: f64,
    confidence: f64,
    standard_error: f64,
) -> Synthesis {
    if standard_error > thresholds.uncertainty_std_err {
        return Synthesis {
            signal: SignalClass::Hold,
            strength: thresholds.uncertainty_hold_strength,
            reasoning: format!(
                "uncertainty override: std_err {:.4} > {:.4}",
                standard_error, thresholds.uncertainty_std_err
            ),
        };
    }

    if ensemble_return > thresholds.strong_return
        && confidence > thresholds.strong_confidence
        && standard_error < thresholds.strong_std_err
    {
        return Synthesis {
            signal: SignalClass::StrongBuy,
            strength: thresholds.strong_strength,
            reasoning: format!(
                "strong buy: return {:.4} > {:.4}, confidence {:.2} > {:.2}, std_err {:.4} < {:.4}",
                ensemble_return,
                thresholds.strong_return,
                confidence,
                thresholds.strong_confidence,
                standard_error,
                thresholds.strong_std_err
            ),
        };
    }

    if ensemble_return > thresholds.weak_return && confidence > thresholds.weak_confidence {
        return Synthesis {
            signal: SignalClass::Buy,
            strength: thresholds.base_strength,
            reasoning: format!(
                "buy: return {:.4} > {:.4}, confidence {:.2} > {:.2}",
                ensemble_return, thresholds.weak_return, confidence, thresholds.weak_confidence
            ),
        };
    }

    if ensemble_return < -thresholds.strong_return
        && confidence > thresholds.strong_confidence
        && standard_error < thresholds.strong_std_err
    {
        return Synthesis {
            signal: SignalClass::StrongSell,
            strength: thresholds.strong_strength,
            reasoning: format!(
                "strong sell: return {:.4} < -{:.4}, confidence {:.2} > {:.2}, std_err {:.4} < {:.4}",
                ensemble_return,
                thresholds.strong_return,
                confidence,
                thresholds.strong_confidence,
                standard_error,
                thresholds.strong_std_err
            ),
        };
    }

    if ensemble_return < -thresholds.weak_return && confidence > thresholds.weak_confidence {
        return Synthesis {
            signal: SignalClass::Sell,
            strength: thresholds.base_strength,
            reasoning: format!(
                "sell: return {:.4} < -{:.4}, confidence {:.2} > {:.2}",
                ensemble_return, thresholds.weak_return, confidence, thresholds.weak_confidence
            ),
        };
    }

    Synthesis {
        signal: SignalClass::Hold,
        strength: 0.0,
        reasoning: format!(
            "hold: return {:.4} / confidence {:.2} below action thresholds",
            ensemble_return, confidence
        ),
    }
}

/// Wrap a synthesis outcome into an immutable signal record
#[allow(clippy::too_many_arguments)]
pub fn into_signal(
    synthesis: Synthesis,
    symbol: &str,
    confidence: f64,
    risk_metrics: SignalRiskMetrics,
    degraded: bool,
    generated_at: DateTime<Utc>,
    validity_secs: i64,
) -> TradingSignal {
    TradingSignal {
        id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        signal: synthesis.signal,
        strength: synthesis.strength.clamp(0.0, 1.0),
        confidence: confidence.clamp(0.0, 1.0),
        reasoning: synthesis.reasoning,
        risk_metrics,
        degraded,
        risk_locked: false,
        generated_at,
        valid_until: generated_at + Duration::seconds(validity_secs),
    }
}
