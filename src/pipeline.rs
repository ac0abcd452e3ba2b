//! Per-symbol prediction pipeline
//!
//! The coordinator owns the full request path:
//!
//! - per-symbol result cache with a short TTL, so bursts of identical
//!   requests are served one computation
//! - single-flight per symbol: concurrent requests for the same key wait
//!   for the first computation instead of duplicating it
//! - horizon fan-out, then a barrier before cross-horizon ensembling
//! - bounded collaborator lookups with neutral defaults on timeout
//! - graceful degradation: missing or stale features, or a fully failed
//!   model set, produce a low-confidence HOLD instead of an error
//! - a broadcast stream of materially changed predictions
//!
//! Requests for different symbols never contend on anything but the cache
//! map itself.

use crate::config::EngineConfig;
use crate::ensemble::{CrossHorizonEnsembler, HorizonEnsembler};
use crate::error::{EngineError, Result};
use crate::levels::LevelsCalculator;
use crate::meta::MetaLearner;
use crate::predictor::PredictorRegistry;
use crate::providers::AnalyticsProvider;
use crate::risk::{RiskAssessor, RiskInputs};
use crate::signal::{into_signal, synthesize, Synthesis};
use crate::sizing::PositionSizer;
use crate::timeframe::ConflictResolver;
use crate::types::{
    EnsembleSignal, FeatureVector, Horizon, MarketPrediction, MarketRegime, MetaFeatures,
    PortfolioContext, RiskAssessment, RiskCategory, RiskProfile, SignalClass, SignalRiskMetrics,
    Timeframe, TradingSignal,
};
use crate::uncertainty;
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Cap on per-symbol stream state retained for materiality gating
const MAX_TRACKED_SYMBOLS: usize = 4096;

/// One prediction request for one symbol
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub symbol: String,
    /// Features from the upstream feature-engineering service. `None`
    /// routes straight to the fallback path.
    pub features: Option<FeatureVector>,
    /// Horizons to predict; empty means all of them
    pub horizons: Vec<Horizon>,
    /// External sentiment score in [-1, 1], when available
    pub sentiment: Option<f64>,
    pub portfolio: PortfolioContext,
    pub risk_profile: RiskProfile,
}

impl PredictionRequest {
    pub fn new(symbol: impl Into<String>, features: FeatureVector) -> Self {
        Self {
            symbol: symbol.into(),
            features: Some(features),
            horizons: Horizon::all().to_vec(),
            sentiment: None,
            portfolio: PortfolioContext::default(),
            risk_profile: RiskProfile::default(),
        }
    }
}

/// A materially changed prediction pushed to stream subscribers
#[derive(Debug, Clone)]
pub struct SignalUpdate {
    pub symbol: String,
    pub prediction: Arc<MarketPrediction>,
}

struct CacheEntry {
    prediction: Arc<MarketPrediction>,
    computed: Instant,
}

/// Last values pushed to the stream for one symbol, for the materiality
/// gate
#[derive(Debug, Clone, Copy)]
struct EmittedState {
    price_target: f64,
    sentiment: Option<f64>,
}

pub struct PipelineCoordinator {
    config: EngineConfig,
    registry: Arc<PredictorRegistry>,
    analytics: Arc<dyn AnalyticsProvider>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    /// Per-symbol computation locks for single-flight
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    last_emitted: Mutex<HashMap<String, EmittedState>>,
    update_tx: broadcast::Sender<SignalUpdate>,
}

impl PipelineCoordinator {
    pub fn new(
        config: EngineConfig,
        registry: Arc<PredictorRegistry>,
        analytics: Arc<dyn AnalyticsProvider>,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            config,
            registry,
            analytics,
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            last_emitted: Mutex::new(HashMap::new()),
            update_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to materially changed predictions
    pub fn subscribe(&self) -> broadcast::Receiver<SignalUpdate> {
        self.update_tx.subscribe()
    }

    /// Serve a prediction, from cache when fresh. Concurrent calls for the
    /// same symbol share one computation.
    pub async fn predict(&self, request: &PredictionRequest) -> Result<Arc<MarketPrediction>> {
        if let Some(cached) = self.cached(&request.symbol).await {
            debug!(symbol = %request.symbol, "serving cached prediction");
            return Ok(cached);
        }

        let lock = self.symbol_lock(&request.symbol).await;
        let _guard = lock.lock().await;

        // Another request may have finished while this one waited
        if let Some(cached) = self.cached(&request.symbol).await {
            debug!(symbol = %request.symbol, "prediction computed by concurrent request");
            return Ok(cached);
        }

        let prediction = Arc::new(self.compute(request).await?);
        self.cache.write().await.insert(
            request.symbol.clone(),
            CacheEntry {
                prediction: Arc::clone(&prediction),
                computed: Instant::now(),
            },
        );
        self.maybe_emit(request, &prediction).await;
        // Waiters still holding the old lock re-check the cache on entry,
        // so the entry itself is no longer needed.
        self.inflight.lock().await.remove(&request.symbol);
        Ok(prediction)
    }

    async fn cached(&self, symbol: &str) -> Option<Arc<MarketPrediction>> {
        let ttl = Duration::from_secs(self.config.pipeline.cache_ttl_secs);
        let cache = self.cache.read().await;
        cache
            .get(symbol)
            .filter(|entry| entry.computed.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.prediction))
    }

    async fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(
            inflight
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Full per-symbol computation: horizon fan-out, cross-horizon
    /// ensemble, synthesis, risk, levels, sizing.
    async fn compute(&self, request: &PredictionRequest) -> Result<MarketPrediction> {
        let now = Utc::now();
        let horizons = self.requested_horizons(request);

        let features = match &request.features {
            Some(f) => f,
            None => {
                warn!(symbol = %request.symbol, "no features available, serving fallback");
                return Ok(self.fallback(request, "features unavailable"));
            }
        };
        let staleness = ChronoDuration::seconds(self.config.pipeline.feature_staleness_secs);
        if now - features.timestamp > staleness {
            warn!(
                symbol = %request.symbol,
                age_secs = (now - features.timestamp).num_seconds(),
                "features stale, serving fallback"
            );
            return Ok(self.fallback(request, "features stale"));
        }

        let mut provider_degraded = false;
        let regime = match self
            .bounded("market_regime", self.analytics.market_regime(&request.symbol))
            .await
        {
            Some(regime) => regime,
            None => {
                provider_degraded = true;
                MarketRegime::default()
            }
        };

        // Fan out the per-horizon predictions on the blocking pool; the
        // cross-horizon stage below is the barrier that waits for all of
        // them.
        let tasks: Vec<_> = horizons
            .iter()
            .map(|&horizon| {
                let registry = Arc::clone(&self.registry);
                let features = features.clone();
                let weights = self.config.model_weights.clone();
                tokio::task::spawn_blocking(move || {
                    (horizon, registry.predict_horizon(&features, horizon, &weights))
                })
            })
            .collect();

        let horizon_ensembler = HorizonEnsembler::new(&self.config.ensemble);
        let mut available = Vec::with_capacity(horizons.len());
        for joined in join_all(tasks).await {
            let (horizon, survivors) = match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!(symbol = %request.symbol, error = %err, "horizon task failed");
                    continue;
                }
            };
            if let Some(prediction) = horizon_ensembler.combine(horizon, &survivors, now) {
                available.push(prediction);
            }
        }

        if available.is_empty() {
            let err = EngineError::AllModelsFailed {
                symbol: request.symbol.clone(),
            };
            warn!(symbol = %request.symbol, error = %err, "serving fallback");
            return Ok(self.fallback(request, "all models failed"));
        }

        let estimate = match CrossHorizonEnsembler::new(&self.config.ensemble)
            .combine(&available, &horizons)
        {
            Some(estimate) => estimate,
            None => {
                warn!(
                    symbol = %request.symbol,
                    "requested horizons carry no importance, serving fallback"
                );
                return Ok(self.fallback(request, "no weighted horizons"));
            }
        };
        let bounds = uncertainty::quantify(&available);

        let degraded = provider_degraded
            || estimate.coverage < 1.0
            || available.iter().any(|h| h.degraded);

        let synthesis = synthesize(
            &self.config.signal,
            estimate.ensemble_return,
            estimate.confidence,
            bounds.standard_error,
        );
        let raw_signal = into_signal(
            synthesis,
            &request.symbol,
            estimate.confidence,
            SignalRiskMetrics {
                standard_error: bounds.standard_error,
                volatility: features.volatility,
                ..Default::default()
            },
            degraded,
            now,
            self.config.pipeline.signal_validity_secs,
        );

        let assessor = RiskAssessor::new(&self.config.risk);
        let risk_inputs = RiskInputs {
            regime,
            sentiment: request.sentiment,
            portfolio: request.portfolio.clone(),
        };
        let assessment = assessor.assess(
            features,
            &bounds,
            &risk_inputs,
            raw_signal.signal.direction(),
        );
        let signal = assessor.filter(&raw_signal, features, &risk_inputs, &assessment);

        let levels = LevelsCalculator::new(&self.config.levels).calculate(
            features,
            signal.signal,
            signal.strength,
        );
        let sizing = PositionSizer::new(&self.config.sizing).size(
            &signal,
            &levels,
            features.volatility,
            &assessment,
            &request.portfolio,
            request.risk_profile,
        );

        info!(
            symbol = %request.symbol,
            signal = %signal.signal,
            confidence = signal.confidence,
            ensemble_return = estimate.ensemble_return,
            horizons = estimate.horizons_used,
            degraded,
            "prediction complete"
        );

        Ok(MarketPrediction {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            horizon_predictions: available,
            ensemble_return: estimate.ensemble_return,
            confidence: estimate.confidence,
            uncertainty: bounds,
            signal,
            risk: assessment,
            sizing: Some(sizing),
            levels: Some(levels),
            degraded,
            computed_at: now,
        })
    }

    /// Low-confidence HOLD served on any unrecoverable per-symbol input
    /// problem. Always marked degraded; never an error to the caller.
    fn fallback(&self, request: &PredictionRequest, reason: &str) -> MarketPrediction {
        let now = Utc::now();
        let confidence = self.config.pipeline.fallback_confidence;
        let signal = into_signal(
            Synthesis {
                signal: SignalClass::Hold,
                strength: 0.0,
                reasoning: format!("fallback: {reason}"),
            },
            &request.symbol,
            confidence,
            SignalRiskMetrics::default(),
            true,
            now,
            self.config.pipeline.signal_validity_secs,
        );
        MarketPrediction {
            id: Uuid::new_v4(),
            symbol: request.symbol.clone(),
            horizon_predictions: Vec::new(),
            ensemble_return: 0.0,
            confidence,
            uncertainty: uncertainty::from_returns(&[]),
            signal,
            risk: RiskAssessment {
                technical: 0.5,
                market: 0.5,
                sentiment: 0.5,
                liquidity: 0.5,
                concentration: 0.5,
                model_uncertainty: 0.5,
                overall: 0.5,
                category: RiskCategory::Medium,
            },
            sizing: None,
            levels: None,
            degraded: true,
            computed_at: now,
        }
    }

    /// Resolve one symbol's per-timeframe signals into the final calibrated
    /// signal.
    pub async fn resolve_timeframes(
        &self,
        symbol: &str,
        signals: BTreeMap<Timeframe, TradingSignal>,
    ) -> Result<EnsembleSignal> {
        let resolution = ConflictResolver::new(&self.config.timeframes).resolve(&signals)?;
        let now = Utc::now();

        let accuracy = self
            .bounded(
                "historical_accuracy",
                self.analytics.historical_accuracy(symbol),
            )
            .await
            .unwrap_or(self.config.meta.default_accuracy)
            .clamp(0.0, 1.0);
        let regime = self
            .bounded("market_regime", self.analytics.market_regime(symbol))
            .await
            .unwrap_or_default();

        let market_volatility = signals
            .values()
            .map(|s| s.risk_metrics.volatility)
            .sum::<f64>()
            / signals.len() as f64;

        let meta_features = MetaFeatures {
            market_volatility,
            signal_agreement: resolution.agreement,
            prediction_confidence: resolution.confidence,
            historical_accuracy: accuracy,
            regime,
            timeframe_consistency: resolution.agreement,
        };

        let resolved = TradingSignal {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            signal: resolution.final_class,
            strength: resolution.strength,
            confidence: resolution.confidence,
            reasoning: format!(
                "timeframe vote: {} of {} timeframes agree on {}, {} conflict(s)",
                (resolution.agreement * signals.len() as f64).round() as usize,
                signals.len(),
                resolution.final_class,
                resolution.conflicts.len()
            ),
            risk_metrics: SignalRiskMetrics {
                volatility: market_volatility,
                ..Default::default()
            },
            degraded: resolution.degraded,
            risk_locked: resolution.risk_locked,
            generated_at: now,
            valid_until: now + ChronoDuration::seconds(self.config.pipeline.signal_validity_secs),
        };

        let final_signal = MetaLearner::new(&self.config.meta).calibrate(&resolved, &meta_features);

        info!(
            symbol,
            final_class = %final_signal.signal,
            confidence = final_signal.confidence,
            conflicts = resolution.conflicts.len(),
            "timeframes resolved"
        );

        Ok(EnsembleSignal {
            symbol: symbol.to_string(),
            timeframe_signals: signals,
            conflicts: resolution.conflicts,
            final_signal,
            meta_features,
            resolution_confidence: resolution.confidence,
            resolved_at: now,
        })
    }

    fn requested_horizons(&self, request: &PredictionRequest) -> Vec<Horizon> {
        if request.horizons.is_empty() {
            return Horizon::all().to_vec();
        }
        let mut horizons = request.horizons.clone();
        horizons.sort();
        horizons.dedup();
        horizons
    }

    /// Bound a collaborator lookup; a timeout or error yields `None` and a
    /// warning, never a failed request.
    async fn bounded<T>(
        &self,
        lookup: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        let timeout_secs = self.config.pipeline.lookup_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(timeout_secs), fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(lookup, error = %err, "analytics lookup failed, using default");
                None
            }
            Err(_) => {
                let err = EngineError::LookupTimeout {
                    lookup: lookup.to_string(),
                    timeout_secs,
                };
                warn!(lookup, error = %err, "analytics lookup timed out, using default");
                None
            }
        }
    }

    /// Push the prediction to subscribers only when it moved materially
    /// since the last emission for this symbol.
    async fn maybe_emit(&self, request: &PredictionRequest, prediction: &Arc<MarketPrediction>) {
        let price = request.features.as_ref().map(|f| f.price).unwrap_or(0.0);
        let price_target = price * (1.0 + prediction.ensemble_return);

        let mut last = self.last_emitted.lock().await;
        let material = match last.get(&prediction.symbol) {
            None => true,
            Some(prev) => {
                let price_delta = if prev.price_target.abs() > f64::EPSILON {
                    ((price_target - prev.price_target) / prev.price_target).abs()
                } else {
                    1.0
                };
                let sentiment_delta = match (request.sentiment, prev.sentiment) {
                    (Some(a), Some(b)) => (a - b).abs(),
                    (None, None) => 0.0,
                    _ => f64::INFINITY,
                };
                price_delta >= self.config.pipeline.materiality_price_delta
                    || sentiment_delta >= self.config.pipeline.materiality_sentiment_delta
            }
        };

        if !material {
            debug!(symbol = %prediction.symbol, "update below materiality thresholds, suppressed");
            return;
        }

        // Bound the tracked-state map; evicting a symbol only costs one
        // extra emission for it later.
        if last.len() >= MAX_TRACKED_SYMBOLS && !last.contains_key(&prediction.symbol) {
            if let Some(evicted) = last.keys().next().cloned() {
                last.remove(&evicted);
            }
        }
        last.insert(
            prediction.symbol.clone(),
            EmittedState {
                price_target,
                sentiment: request.sentiment,
            },
        );
        // A send error only means nobody is subscribed right now
        let _ = self.update_tx.send(SignalUpdate {
            symbol: prediction.symbol.clone(),
            prediction: Arc::clone(prediction),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::test_support::StubPredictor;
    use crate::predictor::Predictor;
    use crate::providers::DefaultAnalytics;
    use crate::types::{BollingerBands, ModelArchitecture, ModelPrediction};
    use async_trait::async_trait;

    fn features(symbol: &str, price: f64) -> FeatureVector {
        FeatureVector {
            symbol: symbol.into(),
            timestamp: Utc::now(),
            price,
            volume: 1_000_000.0,
            rsi: 55.0,
            macd: 0.5,
            bollinger: BollingerBands {
                upper: price * 1.02,
                middle: price,
                lower: price * 0.98,
            },
            sma_20: price * 0.995,
            sma_50: price * 0.99,
            ema_12: price * 1.001,
            ema_26: price * 0.998,
            support: price * 0.95,
            resistance: price * 1.05,
            volatility: 0.02,
            momentum: 0.01,
        }
    }

    fn stub_registry() -> Arc<PredictorRegistry> {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "momentum_stub".into(),
            architecture: ModelArchitecture::Momentum,
            predicted_return: 0.02,
            confidence: 0.8,
        }));
        registry.register(Arc::new(StubPredictor {
            id: "trend_stub".into(),
            architecture: ModelArchitecture::Trend,
            predicted_return: 0.022,
            confidence: 0.78,
        }));
        registry.register(Arc::new(StubPredictor {
            id: "reversion_stub".into(),
            architecture: ModelArchitecture::MeanReversion,
            predicted_return: 0.018,
            confidence: 0.8,
        }));
        Arc::new(registry)
    }

    fn coordinator(config: EngineConfig) -> PipelineCoordinator {
        PipelineCoordinator::new(config, stub_registry(), Arc::new(DefaultAnalytics))
    }

    /// Predictor that fails for one horizon only
    struct HorizonOutage {
        fails_for: Horizon,
    }

    impl Predictor for HorizonOutage {
        fn model_id(&self) -> &str {
            "horizon_outage"
        }

        fn architecture(&self) -> ModelArchitecture {
            ModelArchitecture::Momentum
        }

        fn predict(&self, f: &FeatureVector, horizon: Horizon) -> Result<ModelPrediction> {
            if horizon == self.fails_for {
                return Err(EngineError::HorizonUnavailable {
                    horizon: horizon.to_string(),
                });
            }
            Ok(ModelPrediction {
                model_id: "horizon_outage".into(),
                architecture: ModelArchitecture::Momentum,
                horizon,
                predicted_return: 0.02,
                price_target: f.price * 1.02,
                confidence: 0.8,
            })
        }
    }

    /// Analytics stub that never answers, for timeout tests
    struct HungAnalytics;

    #[async_trait]
    impl AnalyticsProvider for HungAnalytics {
        async fn historical_accuracy(&self, _: &str) -> Result<f64> {
            std::future::pending().await
        }

        async fn market_regime(&self, _: &str) -> Result<MarketRegime> {
            std::future::pending().await
        }
    }

    /// Analytics stub with a fixed accuracy answer
    struct FixedAnalytics {
        accuracy: f64,
    }

    #[async_trait]
    impl AnalyticsProvider for FixedAnalytics {
        async fn historical_accuracy(&self, _: &str) -> Result<f64> {
            Ok(self.accuracy)
        }

        async fn market_regime(&self, _: &str) -> Result<MarketRegime> {
            Ok(MarketRegime::BullishTrend)
        }
    }

    #[tokio::test]
    async fn test_second_request_within_ttl_hits_cache() {
        let pipeline = coordinator(EngineConfig::default());
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        let first = pipeline.predict(&request).await.unwrap();
        let second = pipeline.predict(&request).await.unwrap();
        // Same cached object, not a recomputation
        assert_eq!(first.id, second.id);
        assert_eq!(first.computed_at, second.computed_at);
    }

    #[tokio::test]
    async fn test_expired_cache_recomputes() {
        let mut config = EngineConfig::default();
        config.pipeline.cache_ttl_secs = 0;
        let pipeline = coordinator(config);
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        let first = pipeline.predict(&request).await.unwrap();
        let second = pipeline.predict(&request).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_computation() {
        let pipeline = Arc::new(coordinator(EngineConfig::default()));
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        let (a, b) = tokio::join!(pipeline.predict(&request), pipeline.predict(&request));
        assert_eq!(a.unwrap().id, b.unwrap().id);
    }

    #[tokio::test]
    async fn test_horizon_fan_out_covers_all_requested() {
        let pipeline = coordinator(EngineConfig::default());
        let mut request = PredictionRequest::new("AAPL", features("AAPL", 150.0));
        request.horizons = vec![Horizon::OneWeek, Horizon::OneHour, Horizon::OneDay];

        let prediction = pipeline.predict(&request).await.unwrap();
        let order: Vec<Horizon> = prediction
            .horizon_predictions
            .iter()
            .map(|h| h.horizon)
            .collect();
        // Every requested horizon arrives, in canonical order, regardless
        // of task completion order
        assert_eq!(
            order,
            vec![Horizon::OneHour, Horizon::OneDay, Horizon::OneWeek]
        );
        assert!(!prediction.degraded);
    }

    #[tokio::test]
    async fn test_symbol_lock_released_after_computation() {
        let pipeline = coordinator(EngineConfig::default());
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        pipeline.predict(&request).await.unwrap();
        assert!(pipeline.inflight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unweighted_horizons_fall_back_not_error() {
        let mut config = EngineConfig::default();
        config.ensemble.horizon_weights = BTreeMap::from([(Horizon::OneHour, 1.0)]);
        let pipeline = coordinator(config);
        let mut request = PredictionRequest::new("AAPL", features("AAPL", 150.0));
        request.horizons = vec![Horizon::OneWeek];

        // Predictions exist, but none of them carries any importance
        let prediction = pipeline.predict(&request).await.unwrap();
        assert_eq!(prediction.signal.signal, SignalClass::Hold);
        assert!(prediction.degraded);
        assert!(prediction.signal.reasoning.contains("no weighted horizons"));
    }

    #[tokio::test]
    async fn test_missing_features_falls_back_to_hold() {
        let pipeline = coordinator(EngineConfig::default());
        let request = PredictionRequest {
            symbol: "AAPL".into(),
            features: None,
            horizons: vec![Horizon::OneDay],
            sentiment: None,
            portfolio: PortfolioContext::default(),
            risk_profile: RiskProfile::Balanced,
        };

        let prediction = pipeline.predict(&request).await.unwrap();
        assert_eq!(prediction.signal.signal, SignalClass::Hold);
        assert!(prediction.degraded);
        assert!(prediction.confidence <= 0.3);
        assert!(prediction.sizing.is_none());
    }

    #[tokio::test]
    async fn test_stale_features_fall_back() {
        let pipeline = coordinator(EngineConfig::default());
        let mut stale = features("AAPL", 150.0);
        stale.timestamp = Utc::now() - ChronoDuration::seconds(600);
        let request = PredictionRequest::new("AAPL", stale);

        let prediction = pipeline.predict(&request).await.unwrap();
        assert_eq!(prediction.signal.signal, SignalClass::Hold);
        assert!(prediction.degraded);
        assert!(prediction.signal.reasoning.contains("stale"));
    }

    #[tokio::test]
    async fn test_all_models_failed_falls_back() {
        let registry = PredictorRegistry::new();
        registry.register(Arc::new(StubPredictor {
            id: "nan".into(),
            architecture: ModelArchitecture::Momentum,
            predicted_return: f64::NAN,
            confidence: 0.8,
        }));
        let pipeline = PipelineCoordinator::new(
            EngineConfig::default(),
            Arc::new(registry),
            Arc::new(DefaultAnalytics),
        );
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        let prediction = pipeline.predict(&request).await.unwrap();
        assert_eq!(prediction.signal.signal, SignalClass::Hold);
        assert!(prediction.degraded);
        assert!(prediction.horizon_predictions.is_empty());
    }

    #[tokio::test]
    async fn test_hung_analytics_times_out_to_defaults() {
        let mut config = EngineConfig::default();
        config.pipeline.lookup_timeout_secs = 0;
        let pipeline = PipelineCoordinator::new(config, stub_registry(), Arc::new(HungAnalytics));
        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));

        let prediction = pipeline.predict(&request).await.unwrap();
        // Still a full prediction, just marked degraded
        assert!(prediction.degraded);
        assert!(!prediction.horizon_predictions.is_empty());
    }

    #[tokio::test]
    async fn test_failed_horizon_lowers_confidence() {
        let full = PredictorRegistry::new();
        full.register(Arc::new(HorizonOutage {
            fails_for: Horizon::OneWeek, // not requested below
        }));
        let partial = PredictorRegistry::new();
        partial.register(Arc::new(HorizonOutage {
            fails_for: Horizon::OneHour,
        }));

        let request = |symbol: &str| PredictionRequest {
            symbol: symbol.into(),
            features: Some(features(symbol, 150.0)),
            horizons: vec![Horizon::OneHour, Horizon::OneDay],
            sentiment: None,
            portfolio: PortfolioContext::default(),
            risk_profile: RiskProfile::Balanced,
        };

        let full_pipeline = PipelineCoordinator::new(
            EngineConfig::default(),
            Arc::new(full),
            Arc::new(DefaultAnalytics),
        );
        let partial_pipeline = PipelineCoordinator::new(
            EngineConfig::default(),
            Arc::new(partial),
            Arc::new(DefaultAnalytics),
        );

        let all_ok = full_pipeline.predict(&request("AAPL")).await.unwrap();
        let degraded = partial_pipeline.predict(&request("AAPL")).await.unwrap();

        assert!(!all_ok.degraded);
        assert!(degraded.degraded);
        assert!(degraded.confidence < all_ok.confidence);
        assert_eq!(degraded.horizon_predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_emits_first_then_gates_immaterial_updates() {
        let mut config = EngineConfig::default();
        config.pipeline.cache_ttl_secs = 0;
        let pipeline = coordinator(config);
        let mut updates = pipeline.subscribe();

        let request = PredictionRequest::new("AAPL", features("AAPL", 150.0));
        pipeline.predict(&request).await.unwrap();
        let first = updates.try_recv().expect("first prediction always emits");
        assert_eq!(first.symbol, "AAPL");

        // Identical inputs: price-target delta is zero, nothing emitted
        pipeline.predict(&request).await.unwrap();
        assert!(updates.try_recv().is_err());

        // A 10% price move clears the 5% materiality gate
        let moved = PredictionRequest::new("AAPL", features("AAPL", 165.0));
        pipeline.predict(&moved).await.unwrap();
        assert!(updates.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_sentiment_move_is_material() {
        let mut config = EngineConfig::default();
        config.pipeline.cache_ttl_secs = 0;
        let pipeline = coordinator(config);
        let mut updates = pipeline.subscribe();

        let mut request = PredictionRequest::new("AAPL", features("AAPL", 150.0));
        request.sentiment = Some(0.2);
        pipeline.predict(&request).await.unwrap();
        updates.try_recv().unwrap();

        request.sentiment = Some(0.5);
        pipeline.predict(&request).await.unwrap();
        assert!(updates.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_resolve_timeframes_end_to_end() {
        let pipeline = PipelineCoordinator::new(
            EngineConfig::default(),
            stub_registry(),
            Arc::new(FixedAnalytics { accuracy: 0.9 }),
        );

        let signal = |class: SignalClass, confidence: f64| {
            let now = Utc::now();
            TradingSignal {
                id: Uuid::new_v4(),
                symbol: "AAPL".into(),
                signal: class,
                strength: 0.7,
                confidence,
                reasoning: "test".into(),
                risk_metrics: SignalRiskMetrics {
                    volatility: 0.02,
                    ..Default::default()
                },
                degraded: false,
                risk_locked: false,
                generated_at: now,
                valid_until: now + ChronoDuration::seconds(300),
            }
        };

        let mut signals = BTreeMap::new();
        signals.insert(Timeframe::OneDay, signal(SignalClass::Buy, 0.8));
        signals.insert(Timeframe::OneHour, signal(SignalClass::Buy, 0.75));
        signals.insert(Timeframe::FifteenMinutes, signal(SignalClass::Sell, 0.6));

        let ensemble = pipeline
            .resolve_timeframes("AAPL", signals)
            .await
            .unwrap();
        assert_eq!(ensemble.final_signal.signal, SignalClass::Buy);
        assert_eq!(ensemble.conflicts.len(), 2);
        assert!((ensemble.resolution_confidence - 2.0 / 3.0 * 0.775).abs() < 1e-9);
        // Meta score: (0.9 accuracy + 2/3 consistency) / 2
        let expected_score = (0.9 + 2.0 / 3.0) / 2.0;
        let expected_conf = ensemble.resolution_confidence * expected_score;
        assert!((ensemble.final_signal.confidence - expected_conf).abs() < 1e-9);
        assert_eq!(ensemble.meta_features.historical_accuracy, 0.9);
    }

    #[tokio::test]
    async fn test_resolve_empty_timeframes_is_error() {
        let pipeline = coordinator(EngineConfig::default());
        let result = pipeline.resolve_timeframes("AAPL", BTreeMap::new()).await;
        assert!(matches!(result, Err(EngineError::EmptyTimeframeSet)));
    }
}
