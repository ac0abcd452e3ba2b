//! Position sizing
//!
//! Four independent sizing methods (fractional Kelly, risk parity,
//! volatility targeting, portfolio heat) combined according to the
//! caller's risk profile, then clipped to the configured bounds and the
//! remaining heat budget. All method outputs are fractions of account
//! equity; the notional is derived from the portfolio context at the end.

use crate::config::SizingConfig;
use crate::types::{
    PortfolioContext, PositionSizing, RiskAssessment, RiskCategory, RiskProfile, TradingLevels,
    TradingSignal,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

pub struct PositionSizer<'a> {
    config: &'a SizingConfig,
}

impl<'a> PositionSizer<'a> {
    pub fn new(config: &'a SizingConfig) -> Self {
        Self { config }
    }

    /// Size a position for the filtered signal. HOLD signals and any
    /// non-strong signal under HIGH risk size to exactly zero, not merely
    /// small.
    pub fn size(
        &self,
        signal: &TradingSignal,
        levels: &TradingLevels,
        volatility: f64,
        risk: &RiskAssessment,
        portfolio: &PortfolioContext,
        profile: RiskProfile,
    ) -> PositionSizing {
        let mut constraints = Vec::new();

        if signal.signal.direction() == 0 {
            constraints.push("hold signal: no position".to_string());
            return self.zero(constraints);
        }
        if risk.category == RiskCategory::High && !signal.signal.is_strong() {
            constraints.push("high risk with non-strong signal: position zeroed".to_string());
            return self.zero(constraints);
        }

        let kelly = self.kelly_size(signal, levels);
        let risk_parity = self.risk_parity_size(volatility);
        let vol_target = self.vol_target_size(volatility);
        let heat = self.heat_size(portfolio);

        let combined = match profile {
            RiskProfile::Conservative => kelly.min(risk_parity).min(vol_target).min(heat),
            RiskProfile::Balanced => {
                Self::blend(&self.config.balanced_blend, kelly, risk_parity, vol_target, heat)
            }
            RiskProfile::Aggressive => {
                Self::blend(&self.config.aggressive_blend, kelly, risk_parity, vol_target, heat)
            }
        };

        let mut recommended = combined;
        if recommended > self.config.max_position {
            constraints.push(format!(
                "clipped to max position {:.3}",
                self.config.max_position
            ));
            recommended = self.config.max_position;
        }
        if recommended < self.config.min_position {
            constraints.push(format!(
                "raised to min position {:.3}",
                self.config.min_position
            ));
            recommended = self.config.min_position;
        }
        let heat_remaining = (self.config.heat_budget - portfolio.portfolio_heat).max(0.0);
        if recommended > heat_remaining {
            constraints.push(format!(
                "capped by remaining heat budget {:.3}",
                heat_remaining
            ));
            recommended = heat_remaining;
        }

        debug!(
            symbol = %signal.symbol,
            kelly,
            risk_parity,
            vol_target,
            heat,
            recommended,
            "position sized"
        );

        let notional = Decimal::from_f64(recommended)
            .map(|f| f * portfolio.equity)
            .unwrap_or(Decimal::ZERO);

        PositionSizing {
            recommended_fraction: recommended,
            recommended_notional: notional,
            kelly_fraction: kelly,
            risk_parity_fraction: risk_parity,
            vol_target_fraction: vol_target,
            heat_capped_fraction: heat,
            constraints,
        }
    }

    fn zero(&self, constraints: Vec<String>) -> PositionSizing {
        PositionSizing {
            recommended_fraction: 0.0,
            recommended_notional: Decimal::ZERO,
            kelly_fraction: 0.0,
            risk_parity_fraction: 0.0,
            vol_target_fraction: 0.0,
            heat_capped_fraction: 0.0,
            constraints,
        }
    }

    /// Fractional Kelly. Win probability is mapped from signal conviction;
    /// payoff odds come from the level bracket's risk/reward ratio. Full
    /// Kelly is notoriously aggressive, so only a configured fraction of
    /// it is deployed.
    fn kelly_size(&self, signal: &TradingSignal, levels: &TradingLevels) -> f64 {
        let p = (0.5 + 0.5 * signal.confidence * signal.strength).clamp(0.0, 0.95);
        let b = levels.risk_reward_ratio.max(0.1);
        let full_kelly = p - (1.0 - p) / b;
        (full_kelly * self.config.kelly_fraction).max(0.0)
    }

    /// Equal-risk contribution: budgeted loss per position over volatility
    fn risk_parity_size(&self, volatility: f64) -> f64 {
        if volatility <= 0.0 {
            return self.config.max_position;
        }
        (self.config.risk_per_position / volatility).min(1.0)
    }

    /// Scale exposure so position volatility matches the target
    fn vol_target_size(&self, volatility: f64) -> f64 {
        if volatility <= 0.0 {
            return self.config.max_position;
        }
        (self.config.target_volatility / volatility).min(1.0) * self.config.max_position
    }

    /// Whatever room the aggregate heat budget leaves
    fn heat_size(&self, portfolio: &PortfolioContext) -> f64 {
        (self.config.heat_budget - portfolio.portfolio_heat).max(0.0)
    }

    fn blend(weights: &[f64; 4], kelly: f64, parity: f64, vol: f64, heat: f64) -> f64 {
        weights[0] * kelly + weights[1] * parity + weights[2] * vol + weights[3] * heat
    }
}
