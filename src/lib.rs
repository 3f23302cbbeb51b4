//! Match-outcome (1X2) classifier with expected-value betting signals.
//!
//! Train per-league models from finished matches ([`train::train`]), score upcoming
//! fixtures ([`predict::predict`]) and pick the most likely result
//! ([`predict::best_outcome`]). Models are kept in a [`registry::ModelRegistry`] and
//! persisted as checksummed JSON artifacts.

pub mod artifact;
pub mod backtest;
pub mod boosting;
pub mod config;
pub mod error;
pub mod features;
pub mod forest;
pub mod history;
pub mod metrics;
pub mod model;
pub mod odds;
pub mod outcome;
pub mod predict;
pub mod registry;
pub mod scaler;
pub mod train;
pub mod tree;

pub use error::{PredictorError, Result};
pub use features::{FeatureVector, MatchRecord};
pub use model::{Algorithm, ModelKey, TrainedModel};
pub use odds::OddsQuote;
pub use outcome::Outcome;
pub use predict::{OutcomePrediction, PredictionResult, best_outcome, predict};
pub use registry::{Fallback, ModelRegistry};
pub use train::{TrainConfig, train};
