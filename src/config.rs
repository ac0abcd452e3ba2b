//! Engine configuration
//!
//! Every threshold and weight table the pipeline uses is policy, not
//! physics, so all of them live here rather than as hard-coded constants.
//! Validation rejects weight tables that do not sum to 1 within tolerance;
//! business configuration is never silently renormalized. Runtime
//! renormalization over *surviving* inputs (after model failures) is a
//! different thing and is always allowed.

use crate::error::{EngineError, Result};
use crate::types::{Horizon, ModelArchitecture, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Tolerance for weight tables that must sum to 1
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Static per-architecture ensemble weights, with optional per-horizon
/// overrides. The effective table for each horizon must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelWeights {
    /// Base weight per architecture, applied to every horizon
    pub base: BTreeMap<ModelArchitecture, f64>,
    /// Full replacement table for specific horizons
    pub horizon_overrides: BTreeMap<Horizon, BTreeMap<ModelArchitecture, f64>>,
}

impl Default for ModelWeights {
    fn default() -> Self {
        let mut base = BTreeMap::new();
        base.insert(ModelArchitecture::Momentum, 0.30);
        base.insert(ModelArchitecture::MeanReversion, 0.30);
        base.insert(ModelArchitecture::Trend, 0.30);
        base.insert(ModelArchitecture::Stochastic, 0.10);
        Self {
            base,
            horizon_overrides: BTreeMap::new(),
        }
    }
}

impl ModelWeights {
    /// Static weight for an (architecture, horizon) pair. An override
    /// table fully replaces the base table for its horizon; architectures
    /// absent from it get zero weight there.
    pub fn weight(&self, architecture: ModelArchitecture, horizon: Horizon) -> f64 {
        let table = self.horizon_overrides.get(&horizon).unwrap_or(&self.base);
        table.get(&architecture).copied().unwrap_or(0.0)
    }
}

/// Horizon and cross-horizon ensembling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Base importance per horizon, favoring near-term windows.
    /// Renormalized at runtime over the horizons actually available.
    pub horizon_weights: BTreeMap<Horizon, f64>,
    /// Hard cap on any ensemble confidence
    pub confidence_cap: f64,
    /// Floor added to the squared mean return when normalizing variance,
    /// so near-zero means do not blow the agreement penalty up
    pub variance_floor: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let mut horizon_weights = BTreeMap::new();
        horizon_weights.insert(Horizon::OneHour, 0.4);
        horizon_weights.insert(Horizon::FourHours, 0.3);
        horizon_weights.insert(Horizon::OneDay, 0.2);
        horizon_weights.insert(Horizon::OneWeek, 0.1);
        Self {
            horizon_weights,
            confidence_cap: 0.95,
            variance_floor: 1e-4,
        }
    }
}

/// Deterministic signal synthesis thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// Return above which a strong signal becomes possible
    pub strong_return: f64,
    /// Return above which a plain buy/sell becomes possible
    pub weak_return: f64,
    pub strong_confidence: f64,
    pub weak_confidence: f64,
    /// Standard-error ceiling for strong signals
    pub strong_std_err: f64,
    /// Standard error above which uncertainty overrides direction
    pub uncertainty_std_err: f64,
    pub strong_strength: f64,
    pub base_strength: f64,
    /// Strength assigned to the uncertainty-override HOLD
    pub uncertainty_hold_strength: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_return: 0.03,
            weak_return: 0.01,
            strong_confidence: 0.8,
            weak_confidence: 0.7,
            strong_std_err: 0.02,
            uncertainty_std_err: 0.05,
            strong_strength: 0.9,
            base_strength: 0.7,
            uncertainty_hold_strength: 0.3,
        }
    }
}

/// Component weights and filter policy for the risk assessor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub technical_weight: f64,
    pub market_weight: f64,
    pub sentiment_weight: f64,
    pub liquidity_weight: f64,
    pub concentration_weight: f64,
    pub model_weight: f64,
    /// Overall risk below this is LOW
    pub low_boundary: f64,
    /// Overall risk below this is MEDIUM, at or above HIGH
    pub high_boundary: f64,
    /// Overall risk at or above this is a budget breach: the signal is
    /// forced to HOLD with strength capped, final and not overridable
    pub risk_budget: f64,
    pub forced_hold_strength_cap: f64,
    /// Volatility above this triggers the high-volatility penalty
    pub high_volatility: f64,
    pub volatility_penalty: f64,
    pub trend_conflict_penalty: f64,
    pub sentiment_divergence_penalty: f64,
    /// Sentiment must diverge from signal direction by at least this much
    pub sentiment_divergence_gap: f64,
    /// Volume below this is a liquidity shortfall; the penalty scales with
    /// the shortfall
    pub min_volume: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            technical_weight: 0.25,
            market_weight: 0.25,
            sentiment_weight: 0.15,
            liquidity_weight: 0.15,
            concentration_weight: 0.15,
            model_weight: 0.05,
            low_boundary: 0.25,
            high_boundary: 0.4,
            risk_budget: 0.65,
            forced_hold_strength_cap: 0.3,
            high_volatility: 0.4,
            volatility_penalty: 0.8,
            trend_conflict_penalty: 0.7,
            sentiment_divergence_penalty: 0.85,
            sentiment_divergence_gap: 0.1,
            min_volume: 100_000.0,
        }
    }
}

impl RiskConfig {
    pub fn component_weight_sum(&self) -> f64 {
        self.technical_weight
            + self.market_weight
            + self.sentiment_weight
            + self.liquidity_weight
            + self.concentration_weight
            + self.model_weight
    }
}

/// Position sizing bounds and per-profile blend weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of full Kelly actually deployed
    pub kelly_fraction: f64,
    /// Per-position risk budget for the risk-parity size
    pub risk_per_position: f64,
    /// Annualized volatility target for the vol-targeting size
    pub target_volatility: f64,
    /// Aggregate open-risk budget across the book
    pub heat_budget: f64,
    /// Bounds on the combined recommendation, as equity fractions
    pub min_position: f64,
    pub max_position: f64,
    /// Balanced-profile blend: kelly, risk parity, vol target, heat
    pub balanced_blend: [f64; 4],
    /// Aggressive-profile blend, tilted toward Kelly
    pub aggressive_blend: [f64; 4],
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.35,
            risk_per_position: 0.01,
            target_volatility: 0.15,
            heat_budget: 0.25,
            min_position: 0.0,
            max_position: 0.10,
            balanced_blend: [0.3, 0.3, 0.2, 0.2],
            aggressive_blend: [0.55, 0.15, 0.15, 0.15],
        }
    }
}

/// Stop-loss / take-profit derivation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    /// Multiplier on the volatility proxy for the stop distance
    pub stop_multiplier: f64,
    /// Take-profit distance as a multiple of the stop distance
    pub reward_multiple: f64,
    /// Minimum gap between entry and either level, as a price fraction
    pub min_level_gap: f64,
    /// How far past a support/resistance bound a level may be pushed
    pub structure_buffer: f64,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            stop_multiplier: 1.5,
            reward_multiple: 2.0,
            min_level_gap: 0.002,
            structure_buffer: 0.005,
        }
    }
}

/// Fixed timeframe importance for conflict resolution, longer timeframes
/// weighted higher. Renormalized over the timeframes present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    pub weights: BTreeMap<Timeframe, f64>,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(Timeframe::OneDay, 0.30);
        weights.insert(Timeframe::OneHour, 0.25);
        weights.insert(Timeframe::FifteenMinutes, 0.20);
        weights.insert(Timeframe::FiveMinutes, 0.15);
        weights.insert(Timeframe::OneMinute, 0.10);
        Self { weights }
    }
}

/// Meta-learner calibration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Hard ceiling on final confidence, reserving headroom for
    /// irreducible model risk
    pub confidence_ceiling: f64,
    /// Historical accuracy assumed when the analytics lookup fails
    pub default_accuracy: f64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            confidence_ceiling: 0.95,
            default_accuracy: 0.5,
        }
    }
}

/// Coordinator-level settings: cache, timeouts, staleness, streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-symbol prediction cache TTL
    pub cache_ttl_secs: u64,
    /// Bound on collaborator I/O before defaults kick in
    pub lookup_timeout_secs: u64,
    /// Features older than this are treated as unavailable
    pub feature_staleness_secs: i64,
    /// How long an emitted signal stays valid
    pub signal_validity_secs: i64,
    /// Confidence assigned to fallback signals
    pub fallback_confidence: f64,
    /// Stream update gate: minimum relative price-target move
    pub materiality_price_delta: f64,
    /// Stream update gate: minimum sentiment move
    pub materiality_sentiment_delta: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30,
            lookup_timeout_secs: 5,
            feature_staleness_secs: 120,
            signal_validity_secs: 300,
            fallback_confidence: 0.3,
            materiality_price_delta: 0.05,
            materiality_sentiment_delta: 0.1,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model_weights: ModelWeights,
    pub ensemble: EnsembleConfig,
    pub signal: SignalThresholds,
    pub risk: RiskConfig,
    pub sizing: SizingConfig,
    pub levels: LevelsConfig,
    pub timeframes: TimeframeConfig,
    pub meta: MetaConfig,
    pub pipeline: PipelineConfig,
}

fn check_sum(name: &str, sum: f64) -> Result<()> {
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(EngineError::InvalidConfiguration(format!(
            "{name} weights sum to {sum:.6}, expected 1"
        )));
    }
    Ok(())
}

impl EngineConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject any weight table that does not sum to 1 within tolerance
    pub fn validate(&self) -> Result<()> {
        check_sum("model", self.model_weights.base.values().sum())?;
        for (horizon, table) in &self.model_weights.horizon_overrides {
            check_sum(
                &format!("model[{horizon}]"),
                table.values().sum::<f64>(),
            )?;
        }
        check_sum("horizon", self.ensemble.horizon_weights.values().sum())?;
        check_sum("risk component", self.risk.component_weight_sum())?;
        check_sum("timeframe", self.timeframes.weights.values().sum())?;
        check_sum("balanced blend", self.sizing.balanced_blend.iter().sum())?;
        check_sum("aggressive blend", self.sizing.aggressive_blend.iter().sum())?;

        if self.risk.low_boundary >= self.risk.high_boundary {
            return Err(EngineError::InvalidConfiguration(format!(
                "risk boundaries out of order: low {} >= high {}",
                self.risk.low_boundary, self.risk.high_boundary
            )));
        }
        if self.sizing.min_position > self.sizing.max_position {
            return Err(EngineError::InvalidConfiguration(format!(
                "min position {} exceeds max position {}",
                self.sizing.min_position, self.sizing.max_position
            )));
        }
        if !(0.0..=1.0).contains(&self.meta.confidence_ceiling) {
            return Err(EngineError::InvalidConfiguration(format!(
                "confidence ceiling {} outside [0, 1]",
                self.meta.confidence_ceiling
            )));
        }
        Ok(())
    }
}
