//! Ensemble Prediction and Signal Synthesis Engine
//!
//! Combines pluggable return predictors across multiple horizons into a
//! single calibrated trading signal per symbol.
//!
//! ## Architecture
//!
//! ```text
//! Predictors → Horizon Ensemble → Cross-Horizon Ensemble → Uncertainty
//!                                                              ↓
//!     Meta-Learner ← Conflict Resolver ← Signal Synthesis + Risk Filters
//!                                              ↓
//!                                    Levels + Position Sizing
//! ```
//!
//! The [`pipeline::PipelineCoordinator`] drives the whole path per symbol:
//! cached, single-flight, with bounded collaborator lookups and graceful
//! degradation on every partial-failure path.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod levels;
pub mod meta;
pub mod pipeline;
pub mod predictor;
pub mod providers;
pub mod risk;
pub mod signal;
pub mod sizing;
pub mod timeframe;
pub mod types;
pub mod uncertainty;
