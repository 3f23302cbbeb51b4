use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::artifact;
use crate::error::{PredictorError, Result};
use crate::features::{FeatureVector, MatchRecord};
use crate::model::{ModelKey, TrainedModel};
use crate::odds::OddsQuote;
use crate::predict::{PredictionResult, predict};
use crate::train::{TrainConfig, train};

/// What to do when no model exists for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    /// Fail with [`PredictorError::UnknownModel`].
    #[default]
    None,
    /// Use the equal-probability dummy model.
    Uniform,
}

/// Trained models by `(league, algorithm)`.
///
/// Models are shared as `Arc<TrainedModel>`; installing a model replaces the whole
/// reference, so a caller holding the previous `Arc` keeps a complete, consistent model.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<ModelKey, Arc<TrainedModel>>>,
    artifact_dir: Option<PathBuf>,
}

impl ModelRegistry {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry that lazily loads from, and persists to, `dir`.
    pub fn with_artifact_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            artifact_dir: Some(dir.into()),
        }
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        let guard = self.models.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<ModelKey> = guard.keys().cloned().collect();
        keys.sort_by(|a, b| {
            a.league
                .cmp(&b.league)
                .then(a.algorithm.as_str().cmp(b.algorithm.as_str()))
        });
        keys
    }

    /// In-memory model for `key`, otherwise the stored artifact (cached on success).
    pub fn get(&self, key: &ModelKey) -> Result<Option<Arc<TrainedModel>>> {
        {
            let guard = self.models.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(model) = guard.get(key) {
                return Ok(Some(Arc::clone(model)));
            }
        }

        let Some(dir) = self.artifact_dir.as_deref() else {
            return Ok(None);
        };
        let loaded = artifact::load_for_key(dir, key).map_err(|err| {
            warn!(key = %key, error = %format!("{err:#}"), "rejected model artifact");
            PredictorError::Artifact {
                path: artifact::artifact_path(dir, key),
                reason: format!("{err:#}"),
            }
        })?;
        let Some(model) = loaded else {
            return Ok(None);
        };

        let mut guard = self.models.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have installed a fresher model while we were reading disk.
        let entry = guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(model));
        debug!(key = %key, "model loaded from artifact");
        Ok(Some(Arc::clone(entry)))
    }

    /// Persists (when backed by a directory) then swaps `model` in for its key.
    pub fn install(&self, model: TrainedModel) -> Result<Arc<TrainedModel>> {
        if let Some(dir) = self.artifact_dir.as_deref() {
            artifact::save_model(dir, &model).map_err(|err| PredictorError::Artifact {
                path: artifact::artifact_path(dir, &model.key),
                reason: format!("{err:#}"),
            })?;
        }

        let key = model.key.clone();
        let model = Arc::new(model);
        let previous = {
            let mut guard = self.models.write().unwrap_or_else(PoisonError::into_inner);
            guard.insert(key.clone(), Arc::clone(&model))
        };
        debug!(key = %key, replaced = previous.is_some(), "model installed");
        Ok(model)
    }

    pub fn resolve(&self, key: &ModelKey, fallback: Fallback) -> Result<Arc<TrainedModel>> {
        match (self.get(key)?, fallback) {
            (Some(model), _) => Ok(model),
            (None, Fallback::Uniform) => Ok(Arc::new(TrainedModel::dummy(key.clone()))),
            (None, Fallback::None) => Err(PredictorError::UnknownModel { key: key.clone() }),
        }
    }

    pub fn predict(
        &self,
        key: &ModelKey,
        features: &FeatureVector,
        odds: Option<&OddsQuote>,
        fallback: Fallback,
    ) -> Result<PredictionResult> {
        let model = self.resolve(key, fallback)?;
        predict(&model, features, odds)
    }

    /// Trains a replacement for `key`. On any error the current model stays in place.
    pub fn retrain(
        &self,
        key: &ModelKey,
        history: &[MatchRecord],
        config: &TrainConfig,
    ) -> Result<Arc<TrainedModel>> {
        let config = config.clone().with_algorithm(key.algorithm);
        let model = train(&key.league, history, &config)?;
        self.install(model)
    }
}
