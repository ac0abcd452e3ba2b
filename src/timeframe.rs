//! Multi-timeframe conflict resolution
//!
//! Takes the per-timeframe signals for one symbol, records every pairwise
//! class disagreement for audit, and resolves them by weighted voting:
//! each timeframe votes for its class with importance x confidence x
//! strength, where importance is the fixed table (longer timeframes
//! weighted higher) renormalized over the timeframes present. The
//! resolution confidence is the winning class's share of the voters times
//! its average confidence. A dead-even top vote resolves to HOLD by
//! definition.

use crate::config::TimeframeConfig;
use crate::error::{EngineError, Result};
use crate::types::{SignalClass, Timeframe, TimeframeConflict, TradingSignal};
use std::collections::BTreeMap;
use tracing::debug;

const VOTE_EPSILON: f64 = 1e-9;

/// Outcome of one resolution pass
#[derive(Debug, Clone)]
pub struct Resolution {
    pub final_class: SignalClass,
    /// Vote share of the winning class times its average confidence
    pub confidence: f64,
    /// Mean strength across the winning class's signals
    pub strength: f64,
    pub conflicts: Vec<TimeframeConflict>,
    /// Share of timeframes agreeing with the final class
    pub agreement: f64,
    /// True when any contributing signal was degraded
    pub degraded: bool,
    /// True when any contributing signal carried a risk lock
    pub risk_locked: bool,
}

pub struct ConflictResolver<'a> {
    config: &'a TimeframeConfig,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(config: &'a TimeframeConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        signals: &BTreeMap<Timeframe, TradingSignal>,
    ) -> Result<Resolution> {
        if signals.is_empty() {
            return Err(EngineError::EmptyTimeframeSet);
        }

        let conflicts = Self::collect_conflicts(signals);

        let total_importance: f64 = signals
            .keys()
            .map(|tf| self.config.weights.get(tf).copied().unwrap_or(0.0))
            .sum();
        if total_importance <= 0.0 {
            return Err(EngineError::EmptyTimeframeSet);
        }

        // Weighted vote per exact class
        let mut votes: BTreeMap<&'static str, (SignalClass, f64)> = BTreeMap::new();
        for (tf, signal) in signals {
            let importance =
                self.config.weights.get(tf).copied().unwrap_or(0.0) / total_importance;
            let vote = importance * signal.confidence * signal.strength;
            let entry = votes
                .entry(signal.signal.as_str())
                .or_insert((signal.signal, 0.0));
            entry.1 += vote;
        }

        let mut ranked: Vec<(SignalClass, f64)> = votes.into_values().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let degraded = signals.values().any(|s| s.degraded);
        let risk_locked = signals.values().any(|s| s.risk_locked);

        let (winner, winning_vote) = ranked[0];
        let runner_up_vote = ranked.get(1).map(|(_, v)| *v).unwrap_or(0.0);

        // No effective votes, or a dead-even split, resolves to HOLD
        if winning_vote <= VOTE_EPSILON
            || (winner != SignalClass::Hold
                && (winning_vote - runner_up_vote).abs() <= VOTE_EPSILON)
        {
            debug!("split or empty vote, resolving to HOLD");
            return Ok(Resolution {
                final_class: SignalClass::Hold,
                confidence: 0.0,
                strength: 0.0,
                conflicts,
                agreement: Self::agreement_share(signals, SignalClass::Hold),
                degraded,
                risk_locked,
            });
        }

        let winners: Vec<&TradingSignal> = signals
            .values()
            .filter(|s| s.signal == winner)
            .collect();
        let vote_share = winners.len() as f64 / signals.len() as f64;
        let avg_confidence =
            winners.iter().map(|s| s.confidence).sum::<f64>() / winners.len() as f64;
        let avg_strength =
            winners.iter().map(|s| s.strength).sum::<f64>() / winners.len() as f64;

        Ok(Resolution {
            final_class: winner,
            confidence: (vote_share * avg_confidence).clamp(0.0, 1.0),
            strength: avg_strength.clamp(0.0, 1.0),
            conflicts,
            agreement: vote_share,
            degraded,
            risk_locked,
        })
    }

    /// Every pairwise class disagreement, kept for audit even after the
    /// vote settles it
    fn collect_conflicts(
        signals: &BTreeMap<Timeframe, TradingSignal>,
    ) -> Vec<TimeframeConflict> {
        let entries: Vec<(&Timeframe, &TradingSignal)> = signals.iter().collect();
        let mut conflicts = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (tf_a, sig_a) = entries[i];
                let (tf_b, sig_b) = entries[j];
                if sig_a.signal != sig_b.signal {
                    conflicts.push(TimeframeConflict {
                        timeframe_a: *tf_a,
                        signal_a: sig_a.signal,
                        timeframe_b: *tf_b,
                        signal_b: sig_b.signal,
                    });
                }
            }
        }
        conflicts
    }

    fn agreement_share(
        signals: &BTreeMap<Timeframe, TradingSignal>,
        class: SignalClass,
    ) -> f64 {
        let agreeing = signals.values().filter(|s| s.signal == class).count();
        agreeing as f64 / signals.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalRiskMetrics;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn signal(class: SignalClass, confidence: f64, strength: f64) -> TradingSignal {
        let now = Utc::now();
        TradingSignal {
            id: Uuid::new_v4(),
            symbol: "AAPL".into(),
            signal: class,
            strength,
            confidence,
            reasoning: "test".into(),
            risk_metrics: SignalRiskMetrics::default(),
            degraded: false,
            risk_locked: false,
            generated_at: now,
            valid_until: now + Duration::seconds(300),
        }
    }

    fn resolver_config() -> TimeframeConfig {
        TimeframeConfig::default()
    }

    #[test]
    fn test_majority_buy_outvotes_minority_sell() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Buy, 0.8, 0.7));
        signals.insert(Timeframe::OneHour, signal(SignalClass::Buy, 0.75, 0.7));
        signals.insert(
            Timeframe::FifteenMinutes,
            signal(SignalClass::Sell, 0.6, 0.7),
        );

        let resolution = resolver.resolve(&signals).unwrap();
        assert_eq!(resolution.final_class, SignalClass::Buy);
        // (2/3) * mean(0.8, 0.75) = 0.5167
        assert!((resolution.confidence - 2.0 / 3.0 * 0.775).abs() < 1e-9);
        assert_eq!(resolution.conflicts.len(), 2);
    }

    #[test]
    fn test_unanimous_vote_no_conflicts() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Sell, 0.8, 0.7));
        signals.insert(Timeframe::OneHour, signal(SignalClass::Sell, 0.7, 0.7));

        let resolution = resolver.resolve(&signals).unwrap();
        assert_eq!(resolution.final_class, SignalClass::Sell);
        assert!(resolution.conflicts.is_empty());
        assert_eq!(resolution.agreement, 1.0);
        assert!((resolution.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_split_vote_resolves_to_hold() {
        // Two timeframes, identical importance-weighted votes in opposite
        // directions
        let mut config = resolver_config();
        config.weights.insert(Timeframe::OneDay, 0.5);
        config.weights.insert(Timeframe::OneHour, 0.5);
        let resolver = ConflictResolver::new(&config);

        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Buy, 0.8, 0.7));
        signals.insert(Timeframe::OneHour, signal(SignalClass::Sell, 0.8, 0.7));

        let resolution = resolver.resolve(&signals).unwrap();
        assert_eq!(resolution.final_class, SignalClass::Hold);
        assert_eq!(resolution.confidence, 0.0);
        assert_eq!(resolution.conflicts.len(), 1);
    }

    #[test]
    fn test_all_holds_resolve_to_hold() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Hold, 0.5, 0.0));
        signals.insert(Timeframe::OneHour, signal(SignalClass::Hold, 0.4, 0.0));

        let resolution = resolver.resolve(&signals).unwrap();
        assert_eq!(resolution.final_class, SignalClass::Hold);
    }

    #[test]
    fn test_confidence_bounds() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::StrongBuy, 1.0, 0.9));
        signals.insert(Timeframe::OneHour, signal(SignalClass::StrongBuy, 1.0, 0.9));
        signals.insert(Timeframe::OneMinute, signal(SignalClass::Sell, 0.9, 0.7));

        let resolution = resolver.resolve(&signals).unwrap();
        assert!(resolution.confidence >= 0.0 && resolution.confidence <= 1.0);
    }

    #[test]
    fn test_empty_set_is_error() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let signals = BTreeMap::new();
        assert!(matches!(
            resolver.resolve(&signals),
            Err(EngineError::EmptyTimeframeSet)
        ));
    }

    #[test]
    fn test_longer_timeframe_outvotes_shorter() {
        // Same confidence and strength everywhere; 1d importance (0.3)
        // beats 15m + 5m? No: 0.2 + 0.15 = 0.35 > 0.3. Use 5m + 1m.
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Buy, 0.8, 0.7));
        signals.insert(Timeframe::FiveMinutes, signal(SignalClass::Sell, 0.8, 0.7));
        signals.insert(Timeframe::OneMinute, signal(SignalClass::Sell, 0.8, 0.7));

        let resolution = resolver.resolve(&signals).unwrap();
        // 0.3 vs 0.25 importance: the daily buy still wins
        assert_eq!(resolution.final_class, SignalClass::Buy);
    }

    #[test]
    fn test_risk_lock_and_degraded_propagate() {
        let config = resolver_config();
        let resolver = ConflictResolver::new(&config);
        let mut locked = signal(SignalClass::Hold, 0.2, 0.2);
        locked.risk_locked = true;
        locked.degraded = true;
        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, locked);
        signals.insert(Timeframe::OneHour, signal(SignalClass::Buy, 0.8, 0.7));

        let resolution = resolver.resolve(&signals).unwrap();
        assert!(resolution.risk_locked);
        assert!(resolution.degraded);
    }
}
