//! Signal Engine CLI
//!
//! Demo driver for the prediction pipeline: synthesizes a feature vector
//! for a symbol, runs the full per-symbol path, and prints the resulting
//! prediction as JSON.

use chrono::Utc;
use clap::{Parser, Subcommand};
use signal_engine::{
    config::EngineConfig,
    pipeline::{PipelineCoordinator, PredictionRequest},
    predictor::PredictorRegistry,
    providers::DefaultAnalytics,
    types::{BollingerBands, FeatureVector, PortfolioContext, RiskProfile, Timeframe},
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "signal-engine")]
#[command(about = "Ensemble prediction and trading signal synthesis engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path; defaults apply when the file is absent
    #[arg(short, long, default_value = "engine.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one prediction for a symbol with synthetic features
    Predict {
        /// Symbol to predict
        symbol: String,
        /// Current price used to seed the synthetic features
        #[arg(short, long, default_value = "150.0")]
        price: f64,
        /// External sentiment score in [-1, 1]
        #[arg(short, long)]
        sentiment: Option<f64>,
        /// Risk appetite: conservative, balanced or aggressive
        #[arg(long, default_value = "balanced")]
        profile: String,
    },
    /// Resolve per-timeframe signals for a symbol into one final signal
    Resolve {
        /// Symbol to resolve
        symbol: String,
        /// Price used to seed the synthetic features
        #[arg(short, long, default_value = "150.0")]
        price: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = if Path::new(&cli.config).exists() {
        EngineConfig::from_file(Path::new(&cli.config))?
    } else {
        EngineConfig::default()
    };
    config.validate()?;

    let pipeline = PipelineCoordinator::new(
        config,
        Arc::new(PredictorRegistry::with_baselines()),
        Arc::new(DefaultAnalytics),
    );

    match cli.command {
        Commands::Predict {
            symbol,
            price,
            sentiment,
            profile,
        } => predict(&pipeline, &symbol, price, sentiment, &profile).await,
        Commands::Resolve { symbol, price } => resolve(&pipeline, &symbol, price).await,
    }
}

async fn predict(
    pipeline: &PipelineCoordinator,
    symbol: &str,
    price: f64,
    sentiment: Option<f64>,
    profile: &str,
) -> anyhow::Result<()> {
    let risk_profile = parse_profile(profile)?;
    let mut request = PredictionRequest::new(symbol, synthetic_features(symbol, price));
    request.sentiment = sentiment;
    request.portfolio = PortfolioContext::default();
    request.risk_profile = risk_profile;

    let prediction = pipeline.predict(&request).await?;
    println!("{}", serde_json::to_string_pretty(&*prediction)?);
    Ok(())
}

async fn resolve(pipeline: &PipelineCoordinator, symbol: &str, price: f64) -> anyhow::Result<()> {
    // One independent prediction per timeframe over perturbed features,
    // standing in for the per-timeframe feature sets a live deployment
    // would supply.
    let timeframes = [
        (Timeframe::OneDay, 1.0),
        (Timeframe::OneHour, 0.995),
        (Timeframe::FifteenMinutes, 1.005),
    ];

    let mut signals = BTreeMap::new();
    for (timeframe, perturbation) in timeframes {
        let request = PredictionRequest::new(
            format!("{symbol}:{timeframe}"),
            synthetic_features(symbol, price * perturbation),
        );
        let prediction = pipeline.predict(&request).await?;
        let mut signal = prediction.signal.clone();
        signal.symbol = symbol.to_string();
        signals.insert(timeframe, signal);
    }

    let ensemble = pipeline.resolve_timeframes(symbol, signals).await?;
    println!("{}", serde_json::to_string_pretty(&ensemble)?);
    Ok(())
}

fn parse_profile(profile: &str) -> anyhow::Result<RiskProfile> {
    match profile {
        "conservative" => Ok(RiskProfile::Conservative),
        "balanced" => Ok(RiskProfile::Balanced),
        "aggressive" => Ok(RiskProfile::Aggressive),
        other => anyhow::bail!("unknown risk profile: {other}"),
    }
}

/// Plausible feature vector derived from a single price, for demo runs
fn synthetic_features(symbol: &str, price: f64) -> FeatureVector {
    FeatureVector {
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
        price,
        volume: 2_500_000.0,
        rsi: 58.0,
        macd: price * 0.002,
        bollinger: BollingerBands {
            upper: price * 1.02,
            middle: price,
            lower: price * 0.98,
        },
        sma_20: price * 0.99,
        sma_50: price * 0.97,
        ema_12: price * 1.002,
        ema_26: price * 0.995,
        support: price * 0.94,
        resistance: price * 1.06,
        volatility: 0.025,
        momentum: 0.012,
    }
}
