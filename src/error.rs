use std::path::PathBuf;

use thiserror::Error;

use crate::model::ModelKey;

#[derive(Debug, Error)]
pub enum PredictorError {
    /// Fewer eligible historical matches than the configured minimum.
    #[error("insufficient training data: {available} samples, need at least {required}")]
    InsufficientData { available: usize, required: usize },

    #[error("no trained model for {key}")]
    UnknownModel { key: ModelKey },

    /// The feature input is malformed; individual missing features are not an error.
    #[error("malformed feature vector: {reason}")]
    FeatureMismatch { reason: String },

    #[error("invalid decimal odds for {label}: {value}")]
    InvalidOdds { label: String, value: f64 },

    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The tree learner rejected its input while fitting or predicting.
    #[error("estimator failed: {reason}")]
    Estimator { reason: String },

    #[error("model artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },
}

pub type Result<T, E = PredictorError> = std::result::Result<T, E>;
