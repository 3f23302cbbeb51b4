use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};
use crate::features::FeatureVector;
use crate::model::TrainedModel;
use crate::odds::OddsQuote;
use crate::outcome::Outcome;

pub const HIGH_CONFIDENCE: f64 = 0.70;
pub const MEDIUM_CONFIDENCE: f64 = 0.55;
pub const VALUE_BET_EV_THRESHOLD: f64 = 0.05;

/// Float noise allowed around the value-bet threshold: `0.5 * (2.10 - 1.0) - 0.5`
/// lands a few ULPs above 0.05 and must not count as value.
const EV_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_probability(p: f64) -> Self {
        if p > HIGH_CONFIDENCE {
            ConfidenceTier::High
        } else if p > MEDIUM_CONFIDENCE {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Net expected return of a one-unit stake: `p * (odds - 1) - (1 - p)`.
pub fn expected_value(probability: f64, decimal_odds: f64) -> f64 {
    probability * (decimal_odds - 1.0) - (1.0 - probability)
}

pub fn is_value_bet(ev: f64) -> bool {
    ev > VALUE_BET_EV_THRESHOLD + EV_EPSILON
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrediction {
    pub probability: f64,
    pub confidence: ConfidenceTier,
    /// Present only when odds were quoted for this outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_bet: Option<bool>,
}

impl OutcomePrediction {
    pub fn new(probability: f64, decimal_odds: Option<f64>) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let expected_value = decimal_odds.map(|odds| expected_value(probability, odds));
        Self {
            probability,
            confidence: ConfidenceTier::from_probability(probability),
            expected_value,
            value_bet: expected_value.map(is_value_bet),
        }
    }
}

/// Per-outcome probabilities, tiers and (with odds) EV signals.
///
/// Probabilities are each within [0, 1] but are not renormalised to sum to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionResult {
    entries: BTreeMap<Outcome, OutcomePrediction>,
}

impl PredictionResult {
    pub fn from_probabilities<I>(probabilities: I, odds: Option<&OddsQuote>) -> Self
    where
        I: IntoIterator<Item = (Outcome, f64)>,
    {
        let entries = probabilities
            .into_iter()
            .map(|(outcome, p)| {
                let quoted = odds.and_then(|q| q.get(outcome));
                (outcome, OutcomePrediction::new(p, quoted))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, outcome: Outcome) -> Option<&OutcomePrediction> {
        self.entries.get(&outcome)
    }

    /// Entries in `1, X, 2` order.
    pub fn iter(&self) -> impl Iterator<Item = (Outcome, &OutcomePrediction)> {
        self.entries.iter().map(|(o, p)| (*o, p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value_bets(&self) -> impl Iterator<Item = (Outcome, &OutcomePrediction)> {
        self.iter().filter(|(_, p)| p.value_bet == Some(true))
    }
}

/// Scores one match. Features absent from `features` are read as 0.0 before scaling.
pub fn predict(
    model: &TrainedModel,
    features: &FeatureVector,
    odds: Option<&OddsQuote>,
) -> Result<PredictionResult> {
    if features.is_empty() {
        return Err(PredictorError::FeatureMismatch {
            reason: "feature vector is empty".to_string(),
        });
    }
    if let Some((name, _)) = features.iter().find(|(_, v)| !v.is_finite()) {
        return Err(PredictorError::FeatureMismatch {
            reason: format!("feature '{name}' is not finite"),
        });
    }

    let probs = model.predict_proba(features)?;
    Ok(PredictionResult::from_probabilities(
        model.classes.iter().copied().zip(probs),
        odds,
    ))
}

/// Highest-probability entry; ties resolve in the fixed priority order `1, X, 2`.
pub fn best_outcome(result: &PredictionResult) -> Option<(Outcome, &OutcomePrediction)> {
    let mut best: Option<(Outcome, &OutcomePrediction)> = None;
    for (outcome, prediction) in result.iter() {
        match best {
            Some((_, current)) if prediction.probability <= current.probability => {}
            _ => best = Some((outcome, prediction)),
        }
    }
    best
}
