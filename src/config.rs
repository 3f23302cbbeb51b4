use std::env;
use std::path::PathBuf;

use chrono::Duration;
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::model::Algorithm;
use crate::train::{DEFAULT_MIN_SAMPLES, DEFAULT_SEED, DEFAULT_TEST_FRACTION, TrainConfig};

const APP_DIR: &str = "ev_predictor";
const DEFAULT_HISTORY_LIMIT: usize = 200;
const DEFAULT_RETRAIN_HOURS: i64 = 24;

static CACHE_DIR: OnceCell<Option<PathBuf>> = OnceCell::new();

/// `$XDG_CACHE_HOME/ev_predictor`, falling back to `~/.cache/ev_predictor`.
pub fn app_cache_dir() -> Option<PathBuf> {
    CACHE_DIR
        .get_or_init(|| {
            let base = env::var_os("XDG_CACHE_HOME")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    env::var_os("HOME")
                        .filter(|v| !v.is_empty())
                        .map(|home| PathBuf::from(home).join(".cache"))
                })?;
            Some(base.join(APP_DIR))
        })
        .clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub model_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub algorithm: Algorithm,
    pub minimum_samples: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub history_limit: usize,
    pub retrain_hours: i64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            model_dir: app_cache_dir().map(|dir| dir.join("models")),
            db_path: app_cache_dir().map(|dir| dir.join("history.sqlite")),
            algorithm: Algorithm::default(),
            minimum_samples: DEFAULT_MIN_SAMPLES,
            seed: DEFAULT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            history_limit: DEFAULT_HISTORY_LIMIT,
            retrain_hours: DEFAULT_RETRAIN_HOURS,
        }
    }
}

impl PredictorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model_dir = env_path("PREDICTOR_MODEL_DIR").or(defaults.model_dir);
        let db_path = env_path("PREDICTOR_DB_PATH").or(defaults.db_path);
        let algorithm = match env_string("PREDICTOR_ALGORITHM") {
            Some(raw) => raw.parse::<Algorithm>().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring PREDICTOR_ALGORITHM");
                defaults.algorithm
            }),
            None => defaults.algorithm,
        };
        let minimum_samples = env_parse("PREDICTOR_MIN_SAMPLES")
            .unwrap_or(defaults.minimum_samples)
            .max(2);
        let seed = env_parse("PREDICTOR_SEED").unwrap_or(defaults.seed);
        let test_fraction = env_parse::<f64>("PREDICTOR_TEST_FRACTION")
            .filter(|v| v.is_finite())
            .unwrap_or(defaults.test_fraction)
            .clamp(0.05, 0.5);
        let history_limit = env_parse("PREDICTOR_HISTORY_LIMIT")
            .unwrap_or(defaults.history_limit)
            .max(1);
        let retrain_hours = env_parse::<i64>("PREDICTOR_RETRAIN_HOURS")
            .unwrap_or(defaults.retrain_hours)
            .clamp(1, 24 * 365);

        Self {
            model_dir,
            db_path,
            algorithm,
            minimum_samples,
            seed,
            test_fraction,
            history_limit,
            retrain_hours,
        }
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            algorithm: self.algorithm,
            minimum_samples: self.minimum_samples,
            test_fraction: self.test_fraction,
            seed: self.seed,
        }
    }

    pub fn retrain_max_age(&self) -> Duration {
        Duration::hours(self.retrain_hours)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse::<T>().ok())
}
