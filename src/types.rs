//! Core data records shared across the pipeline
//!
//! All records are created per request and replaced, never mutated, by the
//! next computation. Confidence values throughout are heuristic reliability
//! estimates in [0, 1], not calibrated probabilities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Forward-looking prediction window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl Horizon {
    pub fn all() -> [Horizon; 4] {
        [
            Horizon::OneHour,
            Horizon::FourHours,
            Horizon::OneDay,
            Horizon::OneWeek,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::OneHour => "1h",
            Horizon::FourHours => "4h",
            Horizon::OneDay => "1d",
            Horizon::OneWeek => "1w",
        }
    }

    /// Hours spanned by the window, used to scale per-bar statistics.
    pub fn hours(&self) -> f64 {
        match self {
            Horizon::OneHour => 1.0,
            Horizon::FourHours => 4.0,
            Horizon::OneDay => 24.0,
            Horizon::OneWeek => 168.0,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart timeframe a per-timeframe signal was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::OneDay => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bollinger band snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// Position of `price` inside the band, clamped to [0, 1].
    pub fn position(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= f64::EPSILON {
            return 0.5;
        }
        ((price - self.lower) / width).clamp(0.0, 1.0)
    }
}

/// Per-symbol technical features supplied by the external
/// feature-engineering collaborator. Read-only; the engine only rejects
/// non-finite values at the predictor boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: BollingerBands,
    pub sma_20: f64,
    pub sma_50: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub support: f64,
    pub resistance: f64,
    /// Realized volatility proxy (e.g. stdev of log returns)
    pub volatility: f64,
    /// Short-window return momentum
    pub momentum: f64,
}

/// Predictor family tag. The concrete estimator behind each tag is a
/// pluggable black box; trained models can replace the baseline shims
/// without touching ensembling logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelArchitecture {
    Momentum,
    MeanReversion,
    Trend,
    Stochastic,
}

impl ModelArchitecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelArchitecture::Momentum => "momentum",
            ModelArchitecture::MeanReversion => "mean_reversion",
            ModelArchitecture::Trend => "trend",
            ModelArchitecture::Stochastic => "stochastic",
        }
    }
}

impl fmt::Display for ModelArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single predictor call. Excluded from the ensemble (with a
/// warning, not an error) when any numeric field is non-finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub model_id: String,
    pub architecture: ModelArchitecture,
    pub horizon: Horizon,
    /// Expected fractional return over the horizon (0.02 = +2%)
    pub predicted_return: f64,
    pub price_target: f64,
    pub confidence: f64,
}

impl ModelPrediction {
    /// Predictor boundary check: every numeric output must be finite.
    pub fn is_valid(&self) -> bool {
        self.predicted_return.is_finite()
            && self.price_target.is_finite()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Weighted combination of the surviving model predictions for one horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonPrediction {
    pub horizon: Horizon,
    pub predictions: Vec<ModelPrediction>,
    /// Weight-renormalized mean return of the survivors
    pub ensemble_return: f64,
    /// Agreement-penalized weighted confidence
    pub confidence: f64,
    /// True when at least one registered predictor was dropped
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

/// Symmetric confidence interval around the pooled mean return
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Dispersion-derived uncertainty around the ensemble return.
///
/// Assumes approximately Gaussian dispersion across models; fat-tailed
/// disagreement is not modeled and will understate the true interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyBounds {
    /// Standard error of the pooled mean (sigma / sqrt(n))
    pub standard_error: f64,
    /// 68% interval (+/- 1 sigma)
    pub interval_68: Interval,
    /// 95% interval (+/- 1.96 sigma)
    pub interval_95: Interval,
    /// 99% interval (+/- 2.58 sigma)
    pub interval_99: Interval,
    /// Prediction interval (+/- 2 sigma)
    pub prediction_interval: Interval,
    /// Number of pooled model returns
    pub sample_size: usize,
}

/// Discrete trading recommendation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalClass {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalClass {
    pub fn is_buy_side(&self) -> bool {
        matches!(self, SignalClass::StrongBuy | SignalClass::Buy)
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, SignalClass::StrongSell | SignalClass::Sell)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, SignalClass::StrongBuy | SignalClass::StrongSell)
    }

    /// +1 buy side, -1 sell side, 0 hold
    pub fn direction(&self) -> i8 {
        if self.is_buy_side() {
            1
        } else if self.is_sell_side() {
            -1
        } else {
            0
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::StrongBuy => "STRONG_BUY",
            SignalClass::Buy => "BUY",
            SignalClass::Hold => "HOLD",
            SignalClass::Sell => "SELL",
            SignalClass::StrongSell => "STRONG_SELL",
        }
    }
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk metrics snapshot attached to an emitted signal for audit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalRiskMetrics {
    pub overall_risk: f64,
    pub risk_category: Option<RiskCategory>,
    pub standard_error: f64,
    pub volatility: f64,
}

/// Immutable trading recommendation snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: Uuid,
    pub symbol: String,
    pub signal: SignalClass,
    /// Conviction in [0, 1]
    pub strength: f64,
    /// Heuristic reliability in [0, 1]
    pub confidence: f64,
    /// Names the synthesis rule that fired plus any filters applied
    pub reasoning: String,
    pub risk_metrics: SignalRiskMetrics,
    /// Set on every fallback or partially failed path
    pub degraded: bool,
    /// A risk-budget breach pins the signal to HOLD; downstream stages
    /// must not raise strength or confidence once this is set.
    pub risk_locked: bool,
    pub generated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl TradingSignal {
    /// Staleness is managed through this window, not locks.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.valid_until
    }
}

/// Aggregate multi-factor risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskCategory::Low => "LOW",
            RiskCategory::Medium => "MEDIUM",
            RiskCategory::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// Six-component risk assessment, each component normalized to [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub technical: f64,
    pub market: f64,
    pub sentiment: f64,
    pub liquidity: f64,
    pub concentration: f64,
    pub model_uncertainty: f64,
    /// Fixed-weight combination of the components
    pub overall: f64,
    pub category: RiskCategory,
}

/// Per-method position sizes and the combined recommendation.
/// Method sizes are fractions of account equity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizing {
    /// Combined, clipped recommendation as an equity fraction
    pub recommended_fraction: f64,
    /// Recommendation in account currency
    pub recommended_notional: Decimal,
    pub kelly_fraction: f64,
    pub risk_parity_fraction: f64,
    pub vol_target_fraction: f64,
    pub heat_capped_fraction: f64,
    /// Constraints that bound the final size
    pub constraints: Vec<String>,
}

/// Stop-loss / take-profit bracket around the entry price.
///
/// Invariant: buy-side signals satisfy stop < entry < target, sell-side
/// signals the reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub risk_reward_ratio: f64,
}

/// Top-level per-symbol output, cached with a short TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrediction {
    pub id: Uuid,
    pub symbol: String,
    pub horizon_predictions: Vec<HorizonPrediction>,
    /// Cross-horizon ensemble return
    pub ensemble_return: f64,
    /// Cross-horizon ensemble confidence
    pub confidence: f64,
    pub uncertainty: UncertaintyBounds,
    pub signal: TradingSignal,
    pub risk: RiskAssessment,
    pub sizing: Option<PositionSizing>,
    pub levels: Option<TradingLevels>,
    pub degraded: bool,
    pub computed_at: DateTime<Utc>,
}

/// A pairwise class disagreement between two timeframes, retained for
/// audit even after resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeConflict {
    pub timeframe_a: Timeframe,
    pub signal_a: SignalClass,
    pub timeframe_b: Timeframe,
    pub signal_b: SignalClass,
}

/// Pipeline-reliability descriptors used for final calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFeatures {
    pub market_volatility: f64,
    /// Share of timeframes agreeing with the resolved class
    pub signal_agreement: f64,
    pub prediction_confidence: f64,
    /// Externally supplied; defaults to 0.5 when the lookup fails
    pub historical_accuracy: f64,
    pub regime: MarketRegime,
    pub timeframe_consistency: f64,
}

/// Output of conflict resolution plus meta-learner calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSignal {
    pub symbol: String,
    pub timeframe_signals: BTreeMap<Timeframe, TradingSignal>,
    pub conflicts: Vec<TimeframeConflict>,
    pub final_signal: TradingSignal,
    pub meta_features: MetaFeatures,
    /// Vote share of the winning class times its mean confidence
    pub resolution_confidence: f64,
    pub resolved_at: DateTime<Utc>,
}

/// Coarse market regime label from the analytics collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    BullishTrend,
    BearishTrend,
    Sideways,
    Volatile,
    Crisis,
}

impl MarketRegime {
    /// Baseline market-risk contribution of the regime (0-1)
    pub fn risk_level(&self) -> f64 {
        match self {
            MarketRegime::BullishTrend => 0.30,
            MarketRegime::BearishTrend => 0.50,
            MarketRegime::Sideways => 0.25,
            MarketRegime::Volatile => 0.70,
            MarketRegime::Crisis => 0.95,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::BullishTrend => "bullish_trend",
            MarketRegime::BearishTrend => "bearish_trend",
            MarketRegime::Sideways => "sideways",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Crisis => "crisis",
        }
    }
}

impl Default for MarketRegime {
    fn default() -> Self {
        MarketRegime::Sideways
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appetite presets that steer how the per-method sizes are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    /// Minimum of all methods
    Conservative,
    /// Weighted blend of all methods
    Balanced,
    /// Blend tilted toward Kelly
    Aggressive,
}

impl Default for RiskProfile {
    fn default() -> Self {
        RiskProfile::Balanced
    }
}

/// Portfolio state supplied by the portfolio/risk collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioContext {
    /// Total account equity in account currency
    pub equity: Decimal,
    /// Current exposure to this symbol as a fraction of equity
    pub symbol_exposure: f64,
    /// Aggregate open risk across all positions as a fraction of equity
    pub portfolio_heat: f64,
    pub open_positions: usize,
}

impl Default for PortfolioContext {
    fn default() -> Self {
        Self {
            equity: Decimal::new(10_000, 0),
            symbol_exposure: 0.0,
            portfolio_heat: 0.0,
            open_positions: 0,
        }
    }
}
