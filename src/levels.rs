//! Stop-loss / take-profit derivation
//!
//! The stop distance comes from the volatility proxy, scaled inversely by
//! signal strength (a high-conviction signal tolerates a tighter stop),
//! then bounded by the nearest support/resistance structure. Hard
//! invariant: buy-side brackets satisfy stop < entry < target, sell-side
//! the reverse. Hold signals get an informational buy-side bracket.

use crate::config::LevelsConfig;
use crate::types::{FeatureVector, SignalClass, TradingLevels};

pub struct LevelsCalculator<'a> {
    config: &'a LevelsConfig,
}

impl<'a> LevelsCalculator<'a> {
    pub fn new(config: &'a LevelsConfig) -> Self {
        Self { config }
    }

    pub fn calculate(
        &self,
        features: &FeatureVector,
        signal: SignalClass,
        strength: f64,
    ) -> TradingLevels {
        let entry = features.price;
        // Stronger conviction tightens the stop; the 0.5 floor keeps weak
        // signals from blowing the distance out to infinity.
        let stop_distance =
            entry * features.volatility * self.config.stop_multiplier / (0.5 + strength.clamp(0.0, 1.0));
        let reward_distance = stop_distance * self.config.reward_multiple;

        let min_gap = entry * self.config.min_level_gap;
        let buffer = self.config.structure_buffer;

        let (stop_loss, take_profit) = if signal.is_sell_side() {
            // Short: stop above entry near resistance, target below near
            // support. The entry-gap guard runs last so the bracket
            // invariant holds even when structure sits on the wrong side.
            let mut stop = entry + stop_distance;
            if features.resistance > entry {
                stop = stop.min(features.resistance * (1.0 + buffer));
            }
            let stop = stop.max(entry + min_gap);

            let mut target = entry - reward_distance;
            if features.support < entry {
                target = target.max(features.support * (1.0 - buffer));
            }
            let target = target.min(entry - min_gap);
            (stop, target)
        } else {
            let mut stop = entry - stop_distance;
            if features.support < entry {
                stop = stop.max(features.support * (1.0 - buffer));
            }
            let stop = stop.min(entry - min_gap);

            let mut target = entry + reward_distance;
            if features.resistance > entry {
                target = target.min(features.resistance * (1.0 + buffer));
            }
            let target = target.max(entry + min_gap);
            (stop, target)
        };

        let risk = (entry - stop_loss).abs().max(f64::EPSILON);
        let reward = (take_profit - entry).abs();

        TradingLevels {
            entry,
            stop_loss,
            take_profit,
            support_levels: vec![features.support, features.support * 0.98],
            resistance_levels: vec![features.resistance, features.resistance * 1.02],
            risk_reward_ratio: reward / risk,
        }
    }
}
