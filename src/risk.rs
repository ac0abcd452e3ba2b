//! Multi-factor risk assessment and post-synthesis filtering
//!
//! Six component risks, each normalized to [0, 1], are combined with fixed
//! configured weights into an overall score and category. The filters run
//! after signal synthesis and can only reduce strength or force HOLD,
//! never raise anything. A risk-budget breach pins the signal to HOLD with
//! capped strength and marks it `risk_locked`; no later stage may undo
//! that.

use crate::config::RiskConfig;
use crate::types::{
    FeatureVector, MarketRegime, PortfolioContext, RiskAssessment, RiskCategory, SignalClass,
    TradingSignal, UncertaintyBounds,
};
use tracing::{debug, info};

/// Inputs to an assessment that come from outside the feature vector
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    pub regime: MarketRegime,
    /// External sentiment score in [-1, 1]; `None` when the sentiment
    /// collaborator has nothing for this symbol
    pub sentiment: Option<f64>,
    pub portfolio: PortfolioContext,
}

pub struct RiskAssessor<'a> {
    config: &'a RiskConfig,
}

impl<'a> RiskAssessor<'a> {
    pub fn new(config: &'a RiskConfig) -> Self {
        Self { config }
    }

    /// Score all six components for one symbol. `direction` is the
    /// synthesized signal direction (+1 buy side, -1 sell side, 0 hold),
    /// used only for the sentiment-divergence component.
    pub fn assess(
        &self,
        features: &FeatureVector,
        uncertainty: &UncertaintyBounds,
        inputs: &RiskInputs,
        direction: i8,
    ) -> RiskAssessment {
        let technical = self.technical_risk(features);
        let market = self.market_risk(features, inputs.regime);
        let sentiment = self.sentiment_risk(inputs.sentiment, direction);
        let liquidity = self.liquidity_risk(features.volume);
        let concentration = self.concentration_risk(&inputs.portfolio);
        let model_uncertainty = self.model_risk(uncertainty);

        let overall = technical * self.config.technical_weight
            + market * self.config.market_weight
            + sentiment * self.config.sentiment_weight
            + liquidity * self.config.liquidity_weight
            + concentration * self.config.concentration_weight
            + model_uncertainty * self.config.model_weight;

        let category = if overall < self.config.low_boundary {
            RiskCategory::Low
        } else if overall < self.config.high_boundary {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        };

        debug!(
            symbol = %features.symbol,
            overall,
            category = %category,
            "risk assessment complete"
        );

        RiskAssessment {
            technical,
            market,
            sentiment,
            liquidity,
            concentration,
            model_uncertainty,
            overall,
            category,
        }
    }

    /// Stretched oscillators are where technical reversals bite
    fn technical_risk(&self, features: &FeatureVector) -> f64 {
        let rsi_extremity = ((features.rsi - 50.0).abs() / 50.0).min(1.0);
        let band_extremity =
            ((features.bollinger.position(features.price) - 0.5).abs() * 2.0).min(1.0);
        (0.5 * rsi_extremity + 0.5 * band_extremity).clamp(0.0, 1.0)
    }

    fn market_risk(&self, features: &FeatureVector, regime: MarketRegime) -> f64 {
        let vol_component = (features.volatility / self.config.high_volatility).min(1.0);
        (0.6 * regime.risk_level() + 0.4 * vol_component).clamp(0.0, 1.0)
    }

    /// Sentiment aligned with the trade direction is cheap; sentiment
    /// against it is expensive. Unknown sentiment sits in the middle.
    fn sentiment_risk(&self, sentiment: Option<f64>, direction: i8) -> f64 {
        match (sentiment, direction) {
            (Some(s), d) if d != 0 => ((1.0 - s.clamp(-1.0, 1.0) * d as f64) / 2.0).clamp(0.0, 1.0),
            _ => 0.5,
        }
    }

    fn liquidity_risk(&self, volume: f64) -> f64 {
        if self.config.min_volume <= 0.0 {
            return 0.0;
        }
        (1.0 - volume / (2.0 * self.config.min_volume)).clamp(0.0, 1.0)
    }

    fn concentration_risk(&self, portfolio: &PortfolioContext) -> f64 {
        (portfolio.symbol_exposure * 5.0).clamp(0.0, 1.0)
    }

    fn model_risk(&self, uncertainty: &UncertaintyBounds) -> f64 {
        (uncertainty.standard_error / 0.05).clamp(0.0, 1.0)
    }

    /// Apply the post-synthesis filters. Each filter can only lower
    /// strength; the budget breach forces HOLD and locks the record.
    /// Returns a new record, leaving the input untouched.
    pub fn filter(
        &self,
        signal: &TradingSignal,
        features: &FeatureVector,
        inputs: &RiskInputs,
        assessment: &RiskAssessment,
    ) -> TradingSignal {
        let mut filtered = signal.clone();
        filtered.risk_metrics.overall_risk = assessment.overall;
        filtered.risk_metrics.risk_category = Some(assessment.category);
        filtered.risk_metrics.volatility = features.volatility;

        if assessment.overall >= self.config.risk_budget {
            info!(
                symbol = %signal.symbol,
                overall = assessment.overall,
                budget = self.config.risk_budget,
                "risk budget breached, forcing HOLD"
            );
            filtered.signal = SignalClass::Hold;
            filtered.strength = filtered
                .strength
                .min(self.config.forced_hold_strength_cap);
            filtered.risk_locked = true;
            filtered.reasoning = format!(
                "{}; risk budget breach ({:.2} >= {:.2}): forced HOLD",
                filtered.reasoning, assessment.overall, self.config.risk_budget
            );
            return filtered;
        }

        let direction = filtered.signal.direction();

        if features.volatility > self.config.high_volatility {
            filtered.strength *= self.config.volatility_penalty;
            filtered.reasoning.push_str("; high-volatility penalty");
        }

        if direction != 0 {
            let trend_up = features.momentum > 0.0 && features.sma_20 >= features.sma_50;
            let trend_down = features.momentum < 0.0 && features.sma_20 <= features.sma_50;
            let conflicted =
                (direction > 0 && trend_down) || (direction < 0 && trend_up);
            if conflicted {
                filtered.strength *= self.config.trend_conflict_penalty;
                filtered.reasoning.push_str("; trend-conflict penalty");
            }

            if let Some(sentiment) = inputs.sentiment {
                if sentiment * (direction as f64) < -self.config.sentiment_divergence_gap {
                    filtered.strength *= self.config.sentiment_divergence_penalty;
                    filtered.reasoning.push_str("; sentiment-divergence penalty");
                }
            }
        }

        if features.volume < self.config.min_volume && self.config.min_volume > 0.0 {
            let shortfall_factor = (features.volume / self.config.min_volume).clamp(0.0, 1.0);
            filtered.strength *= shortfall_factor;
            filtered
                .reasoning
                .push_str("; liquidity-shortfall penalty");
        }

        filtered.strength = filtered.strength.clamp(0.0, 1.0);
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalThresholds;
    use crate::signal::{into_signal, synthesize};
    use crate::types::{BollingerBands, SignalRiskMetrics};
    use crate::uncertainty;
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
            sma_20: 151.0,
            sma_50: 148.0,
            ema_12: 150.5,
            ema_26: 149.0,
            support: 140.0,
            resistance: 160.0,
            volatility: 0.2,
            momentum: 0.02,
        }
    }

    fn buy_signal() -> TradingSignal {
        into_signal(
            synthesize(&SignalThresholds::default(), 0.02, 0.78, 0.005),
            "AAPL",
            0.78,
            SignalRiskMetrics::default(),
            false,
            Utc::now(),
            300,
        )
    }

    fn bounds(std_err: f64) -> UncertaintyBounds {
        let mut b = uncertainty::from_returns(&[0.01, 0.02, 0.03]);
        b.standard_error = std_err;
        b
    }

    #[test]
    fn test_components_in_unit_interval() {
        let config = RiskConfig::default();
        let assessor = RiskAssessor::new(&config);
        let assessment = assessor.assess(&features(), &bounds(0.01), &RiskInputs::default(), 1);
        for component in [
            assessment.technical,
            assessment.market,
            assessment.sentiment,
            assessment.liquidity,
            assessment.concentration,
            assessment.model_uncertainty,
            assessment.overall,
        ] {
            assert!((0.0..=1.0).contains(&component));
        }
    }

    #[test]
    fn test_category_boundaries() {
        let config = RiskConfig::default();
        let assessor = RiskAssessor::new(&config);

        // Calm: neutral features, quiet regime, deep liquidity
        let mut calm = features();
        calm.rsi = 50.0;
        calm.volatility = 0.05;
        calm.volume = 10_000_000.0;
        let low = assessor.assess(&calm, &bounds(0.001), &RiskInputs::default(), 0);
        assert_eq!(low.category, RiskCategory::Low);

        // Stressed: crisis regime, stretched technicals, thin book
        let mut stressed = features();
        stressed.rsi = 95.0;
        stressed.volatility = 0.8;
        stressed.volume = 1_000.0;
        let inputs = RiskInputs {
            regime: MarketRegime::Crisis,
            sentiment: Some(-0.9),
            portfolio: PortfolioContext {
                symbol_exposure: 0.3,
                ..Default::default()
            },
        };
        let high = assessor.assess(&stressed, &bounds(0.05), &inputs, 1);
        assert_eq!(high.category, RiskCategory::High);
        assert!(high.overall > low.overall);
    }

    #[test]
    fn test_sentiment_divergence_raises_component() {
        let config = RiskConfig::default();
        let assessor = RiskAssessor::new(&config);
        let aligned = assessor.sentiment_risk(Some(0.8), 1);
        let divergent = assessor.sentiment_risk(Some(-0.8), 1);
        let unknown = assessor.sentiment_risk(None, 1);
        assert!(aligned < unknown);
        assert!(divergent > unknown);
        assert_eq!(unknown, 0.5);
    }

    #[test]
    fn test_filters_never_increase_strength() {
        let config = RiskConfig::default();
        let assessor = RiskAssessor::new(&config);
        let signal = buy_signal();
        let mut f = features();
        f.volatility = 0.5; // trips the volatility filter
        f.momentum = -0.02; // trips the trend-conflict filter
        f.sma_20 = 140.0;
        f.volume = 50_000.0; // trips the liquidity filter
        let inputs = RiskInputs {
            sentiment: Some(-0.5),
            ..Default::default()
        };
        let assessment = assessor.assess(&f, &bounds(0.01), &inputs, 1);
        let filtered = assessor.filter(&signal, &f, &inputs, &assessment);
        assert!(filtered.strength < signal.strength);
        assert!(filtered.reasoning.contains("penalty"));
    }

    #[test]
    fn test_budget_breach_forces_locked_hold() {
        let mut config = RiskConfig::default();
        config.risk_budget = 0.2; // easy to breach
        let assessor = RiskAssessor::new(&config);
        let signal = buy_signal();
        let f = features();
        let inputs = RiskInputs {
            regime: MarketRegime::Crisis,
            ..Default::default()
        };
        let assessment = assessor.assess(&f, &bounds(0.04), &inputs, 1);
        assert!(assessment.overall >= 0.2);

        let filtered = assessor.filter(&signal, &f, &inputs, &assessment);
        assert_eq!(filtered.signal, SignalClass::Hold);
        assert!(filtered.strength <= 0.3);
        assert!(filtered.risk_locked);
        assert!(filtered.reasoning.contains("risk budget breach"));
    }

    #[test]
    fn test_clean_signal_passes_unchanged() {
        let config = RiskConfig::default();
        let assessor = RiskAssessor::new(&config);
        let signal = buy_signal();
        let f = features(); // aligned trend, adequate volume, calm vol
        let inputs = RiskInputs {
            sentiment: Some(0.4),
            ..Default::default()
        };
        let assessment = assessor.assess(&f, &bounds(0.005), &inputs, 1);
        let filtered = assessor.filter(&signal, &f, &inputs, &assessment);
        assert_eq!(filtered.signal, signal.signal);
        assert_eq!(filtered.strength, signal.strength);
        assert!(!filtered.risk_locked);
    }
}
