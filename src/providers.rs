//! External analytics collaborators
//!
//! Historical accuracy and regime classification live outside the engine.
//! They are reached through the [`AnalyticsProvider`] capability trait so
//! the pipeline can bound every lookup with a timeout and substitute
//! defaults when a collaborator is slow or down. The engine itself never
//! blocks on these.

use crate::error::Result;
use crate::types::MarketRegime;
use async_trait::async_trait;

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// Fraction of this symbol's past predictions that resolved correctly,
    /// in [0, 1]
    async fn historical_accuracy(&self, symbol: &str) -> Result<f64>;

    /// Current coarse regime label for the symbol's market
    async fn market_regime(&self, symbol: &str) -> Result<MarketRegime>;
}

/// Stand-in used when no analytics service is wired up. Returns the same
/// neutral values the pipeline falls back to on lookup failure, so a bare
/// engine and a degraded engine behave identically.
#[derive(Debug, Clone, Default)]
pub struct DefaultAnalytics;

#[async_trait]
impl AnalyticsProvider for DefaultAnalytics {
    async fn historical_accuracy(&self, _symbol: &str) -> Result<f64> {
        Ok(0.5)
    }

    async fn market_regime(&self, _symbol: &str) -> Result<MarketRegime> {
        Ok(MarketRegime::Sideways)
    }
}
