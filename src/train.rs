use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::boosting::{BoostedTrees, BoostingParams};
use crate::error::{PredictorError, Result};
use crate::features::{MatchRecord, build_training_rows, default_feature_names};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::{self, ModelMetrics};
use crate::model::{Algorithm, Classifier, MODEL_FORMAT_VERSION, ModelKey, TrainedModel};
use crate::outcome::{Outcome, observed_classes};
use crate::scaler::StandardScaler;

pub const DEFAULT_MIN_SAMPLES: usize = 50;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Both splits need at least one row.
const HARD_MIN_SAMPLES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub algorithm: Algorithm,
    pub minimum_samples: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            minimum_samples: DEFAULT_MIN_SAMPLES,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl TrainConfig {
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_minimum_samples(mut self, minimum_samples: usize) -> Self {
        self.minimum_samples = minimum_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Trains a fresh model for `league` from finished historical matches.
///
/// Fails with [`PredictorError::InsufficientData`] when fewer than
/// `config.minimum_samples` matches are eligible.
pub fn train(league: &str, history: &[MatchRecord], config: &TrainConfig) -> Result<TrainedModel> {
    let key = ModelKey::new(league, config.algorithm);
    let rows = build_training_rows(history);
    let required = config.minimum_samples.max(HARD_MIN_SAMPLES);
    if rows.len() < required {
        warn!(
            key = %key,
            available = rows.len(),
            required,
            "not enough finished matches to train"
        );
        return Err(PredictorError::InsufficientData {
            available: rows.len(),
            required,
        });
    }

    let feature_names = default_feature_names();
    let n_features = feature_names.len();
    let outcomes: Vec<Outcome> = rows.iter().map(|r| r.outcome).collect();
    let classes = observed_classes(&outcomes);
    let x: Vec<Vec<f64>> = rows.iter().map(|r| r.features.to_row(&feature_names)).collect();
    let y: Vec<usize> = outcomes
        .iter()
        .map(|o| classes.iter().position(|c| c == o).unwrap_or(0))
        .collect();

    let (train_idx, test_idx) = split_indices(rows.len(), config.test_fraction, config.seed);
    let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
    let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

    let scaler = StandardScaler::fit(&x_train, n_features);
    let x_train = scaler.transform(&x_train);
    let x_test = scaler.transform(&x_test);

    let classifier = fit_classifier(
        config.algorithm,
        &x_train,
        &y_train,
        classes.len(),
        n_features,
        config.seed,
    )?;

    let probs: Vec<Vec<f64>> = x_test
        .iter()
        .map(|row| classifier.predict_proba(row))
        .collect::<Result<_>>()?;
    let y_pred: Vec<usize> = probs.iter().map(|p| metrics::argmax(p)).collect();
    let (precision, recall, f1_score) =
        metrics::weighted_precision_recall_f1(&y_pred, &y_test, classes.len());
    let (brier, log_loss) = metrics::brier_and_log_loss(&probs, &y_test);
    let metrics = ModelMetrics {
        accuracy: metrics::accuracy(&y_pred, &y_test),
        precision,
        recall,
        f1_score,
        brier,
        log_loss,
        train_samples: train_idx.len(),
        test_samples: test_idx.len(),
    };

    info!(
        key = %key,
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1_score,
        train = metrics.train_samples,
        test = metrics.test_samples,
        "model trained"
    );

    Ok(TrainedModel {
        format_version: MODEL_FORMAT_VERSION,
        key,
        classes,
        feature_names,
        scaler,
        classifier,
        metrics,
        seed: config.seed,
        trained_at: Utc::now(),
    })
}

fn fit_classifier(
    algorithm: Algorithm,
    x: &[Vec<f64>],
    y: &[usize],
    n_classes: usize,
    n_features: usize,
    seed: u64,
) -> Result<Classifier> {
    let classifier = match algorithm {
        Algorithm::GradientBoostedTrees => Classifier::Boosted(BoostedTrees::fit(
            x,
            y,
            n_classes,
            n_features,
            BoostingParams::gradient_boosted_trees(),
        )),
        Algorithm::GradientBoosting => Classifier::Boosted(BoostedTrees::fit(
            x,
            y,
            n_classes,
            n_features,
            BoostingParams::gradient_boosting(),
        )),
        Algorithm::RandomForest => Classifier::Forest(RandomForest::fit(
            x,
            y,
            n_classes,
            n_features,
            ForestParams::default(),
            seed,
        )?),
    };
    Ok(classifier)
}

/// Seeded shuffle, then the first `ceil(n * test_fraction)` indices (clamped to
/// `1..=n-1`) form the test split.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    if n < 2 {
        return (idx, Vec::new());
    }
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);

    let fraction = test_fraction.clamp(0.0, 1.0);
    let n_test = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);
    let train = idx.split_off(n_test);
    (train, idx)
}
