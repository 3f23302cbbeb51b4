use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::boosting::BoostedTrees;
use crate::error::{PredictorError, Result};
use crate::features::{FeatureVector, default_feature_names};
use crate::forest::RandomForest;
use crate::metrics::ModelMetrics;
use crate::outcome::Outcome;
use crate::scaler::StandardScaler;

/// Bumped whenever the serialized layout of [`TrainedModel`] changes.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    GradientBoostedTrees,
    RandomForest,
    GradientBoosting,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::GradientBoostedTrees => "gradient_boosted_trees",
            Algorithm::RandomForest => "random_forest",
            Algorithm::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = PredictorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gradient_boosted_trees" | "gbt" | "xgboost" => Ok(Algorithm::GradientBoostedTrees),
            "random_forest" | "rf" => Ok(Algorithm::RandomForest),
            "gradient_boosting" | "gb" => Ok(Algorithm::GradientBoosting),
            _ => Err(PredictorError::UnknownAlgorithm(raw.to_string())),
        }
    }
}

/// Models are kept per league and algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub league: String,
    pub algorithm: Algorithm,
}

impl ModelKey {
    pub fn new(league: &str, algorithm: Algorithm) -> Self {
        Self {
            league: league.trim().to_string(),
            algorithm,
        }
    }

    /// Filesystem-safe stem: `premier_league_random_forest_` followed by 12 hex digits.
    ///
    /// The trailing hex is a digest of the exact league name, so leagues that normalise
    /// to the same readable part (`Serie A`, `serie-a`) still get distinct stems.
    pub fn slug(&self) -> String {
        let mut league = String::with_capacity(self.league.len());
        let mut last_underscore = true;
        for ch in self.league.chars() {
            if ch.is_ascii_alphanumeric() {
                league.push(ch.to_ascii_lowercase());
                last_underscore = false;
            } else if !last_underscore {
                league.push('_');
                last_underscore = true;
            }
        }
        let league = league.trim_end_matches('_');
        let league = if league.is_empty() { "league" } else { league };
        let digest = Sha256::digest(self.league.as_bytes());
        let tag: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
        format!("{league}_{}_{tag}", self.algorithm)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.league, self.algorithm)
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    /// Equal probability for every class; the explicit fallback model.
    Uniform { n_classes: usize },
    Boosted(BoostedTrees),
    Forest(RandomForest),
}

impl Classifier {
    pub fn n_classes(&self) -> usize {
        match self {
            Classifier::Uniform { n_classes } => *n_classes,
            Classifier::Boosted(m) => m.n_classes(),
            Classifier::Forest(m) => m.n_classes(),
        }
    }

    pub fn predict_proba(&self, scaled_row: &[f64]) -> Result<Vec<f64>> {
        match self {
            Classifier::Uniform { n_classes } => {
                Ok(vec![1.0 / (*n_classes).max(1) as f64; *n_classes])
            }
            Classifier::Boosted(m) => Ok(m.predict_proba(scaled_row)),
            Classifier::Forest(m) => m.predict_proba(scaled_row),
        }
    }

    fn is_well_formed(&self, n_features: usize) -> bool {
        match self {
            Classifier::Uniform { .. } => true,
            Classifier::Boosted(m) => m.is_well_formed(n_features),
            Classifier::Forest(m) => m.is_well_formed(n_features),
        }
    }
}

/// Everything needed to reproduce predictions: weights, scaling, and both orderings.
///
/// Never mutated after construction; retraining produces a new value.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub format_version: u32,
    pub key: ModelKey,
    /// Class labels in classifier output order.
    pub classes: Vec<Outcome>,
    /// Feature names in the column order the scaler and classifier were fitted on.
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: Classifier,
    pub metrics: ModelMetrics,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Deterministic fallback: 1/3 for each of `1`, `X`, `2`, regardless of features.
    pub fn dummy(key: ModelKey) -> Self {
        let feature_names = default_feature_names();
        let n = feature_names.len();
        Self {
            format_version: MODEL_FORMAT_VERSION,
            key,
            classes: Outcome::ALL.to_vec(),
            feature_names,
            scaler: StandardScaler::identity(n),
            classifier: Classifier::Uniform { n_classes: 3 },
            metrics: ModelMetrics::default(),
            seed: 0,
            trained_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.classifier, Classifier::Uniform { .. })
    }

    /// Per-class probabilities in `classes` order for raw (unscaled) features.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let raw = features.to_row(&self.feature_names);
        let scaled = self.scaler.transform_row(&raw);
        self.classifier.predict_proba(&scaled)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.trained_at)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.is_fallback() || self.age(now) > max_age
    }

    /// Orderings and widths agree across classes, features, scaler, and classifier.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "format version {} (expected {MODEL_FORMAT_VERSION})",
                self.format_version
            ));
        }
        let n_features = self.feature_names.len();
        if self.scaler.n_features() != n_features || self.scaler.stds.len() != n_features {
            return Err(format!(
                "scaler width {} does not match {n_features} feature names",
                self.scaler.n_features()
            ));
        }
        if self.classes.is_empty() || self.classes.len() != self.classifier.n_classes() {
            return Err(format!(
                "{} class labels for a {}-class classifier",
                self.classes.len(),
                self.classifier.n_classes()
            ));
        }
        let mut sorted = self.classes.clone();
        sorted.sort();
        sorted.dedup();
        if sorted != self.classes {
            return Err("class labels are duplicated or out of order".to_string());
        }
        if !self.classifier.is_well_formed(n_features) {
            return Err("classifier trees reference unknown features or nodes".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boosting::BoostingParams;

    #[test]
    fn algorithm_parses_aliases() {
        assert_eq!("xgboost".parse::<Algorithm>().unwrap(), Algorithm::GradientBoostedTrees);
        assert_eq!("random-forest".parse::<Algorithm>().unwrap(), Algorithm::RandomForest);
        assert_eq!("GB".parse::<Algorithm>().unwrap(), Algorithm::GradientBoosting);
        assert!(matches!(
            "svm".parse::<Algorithm>(),
            Err(PredictorError::UnknownAlgorithm(_))
        ));
    }

    fn is_stem(slug: &str, readable: &str) -> bool {
        slug.strip_prefix(readable)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|tag| tag.len() == 12 && tag.chars().all(|c| c.is_ascii_hexdigit()))
    }

    #[test]
    fn key_slug_is_filesystem_safe() {
        let key = ModelKey::new("Premier League", Algorithm::RandomForest);
        assert!(is_stem(&key.slug(), "premier_league_random_forest"), "{}", key.slug());
        let key = ModelKey::new("  ", Algorithm::GradientBoosting);
        assert!(is_stem(&key.slug(), "league_gradient_boosting"), "{}", key.slug());
        let key = ModelKey::new("Ligue 1 / Uber Eats", Algorithm::GradientBoosting);
        assert!(key.slug().chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn leagues_with_the_same_readable_stem_get_distinct_slugs() {
        let spaced = ModelKey::new("Serie A", Algorithm::RandomForest);
        let dashed = ModelKey::new("serie-a", Algorithm::RandomForest);
        assert!(is_stem(&spaced.slug(), "serie_a_random_forest"));
        assert!(is_stem(&dashed.slug(), "serie_a_random_forest"));
        assert_ne!(spaced.slug(), dashed.slug());
        assert_eq!(spaced.slug(), ModelKey::new(" Serie A ", Algorithm::RandomForest).slug());
    }

    #[test]
    fn fallback_and_old_models_are_stale() {
        let max_age = Duration::hours(24);
        let now = Utc::now();
        let dummy = TrainedModel {
            trained_at: now,
            ..TrainedModel::dummy(ModelKey::new("La Liga", Algorithm::default()))
        };
        assert!(dummy.is_stale(now, max_age));

        let fitted = TrainedModel {
            classifier: Classifier::Boosted(BoostedTrees::fit(
                &[vec![0.0], vec![1.0]],
                &[0, 1],
                2,
                1,
                BoostingParams::gradient_boosted_trees(),
            )),
            classes: vec![Outcome::Home, Outcome::Draw],
            trained_at: now - Duration::hours(23),
            ..dummy
        };
        assert!(!fitted.is_fallback());
        assert!(!fitted.is_stale(now, max_age));
        assert!(!fitted.is_stale(now + Duration::minutes(59), max_age));
        assert!(fitted.is_stale(now + Duration::hours(2), max_age));
    }

    #[test]
    fn dummy_model_is_uniform_and_valid() {
        let model = TrainedModel::dummy(ModelKey::new("La Liga", Algorithm::default()));
        assert!(model.is_fallback());
        assert!(model.validate().is_ok());
        let p = model
            .predict_proba(&FeatureVector::new().with("home_xg", 3.0))
            .unwrap();
        assert_eq!(p, vec![1.0 / 3.0; 3]);
    }
}
