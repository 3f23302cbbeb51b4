use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PredictorError, Result};
use crate::odds::OddsQuote;
use crate::outcome::{Outcome, classify_outcome};

/// Matches of history used for the recent-form differential.
pub const FORM_WINDOW: usize = 5;

pub const FEATURE_NAMES: [&str; 11] = [
    "home_possession",
    "away_possession",
    "home_shots",
    "away_shots",
    "home_xg",
    "away_xg",
    "goal_difference_last5_home",
    "goal_difference_last5_away",
    "possession_difference",
    "shot_difference",
    "xg_difference",
];

pub fn default_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Named numeric features for one match.
///
/// Lookups go through [`FeatureVector::get_or_zero`]: a feature that was never set reads as 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Raw values in `names` order, absent names filled with 0.0.
    pub fn to_row(&self, names: &[String]) -> Vec<f64> {
        names.iter().map(|name| self.get_or_zero(name)).collect()
    }

    /// Parses untyped input (e.g. a request body) into a feature vector.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(PredictorError::FeatureMismatch {
                reason: format!("expected an object of named features, got {}", kind(value)),
            });
        };
        if map.is_empty() {
            return Err(PredictorError::FeatureMismatch {
                reason: "feature vector is empty".to_string(),
            });
        }

        let mut out = FeatureVector::new();
        for (name, raw) in map {
            let Some(v) = raw.as_f64() else {
                return Err(PredictorError::FeatureMismatch {
                    reason: format!("feature '{name}' is not numeric ({})", kind(raw)),
                });
            };
            if !v.is_finite() {
                return Err(PredictorError::FeatureMismatch {
                    reason: format!("feature '{name}' is not finite"),
                });
            }
            out.insert(name, v);
        }
        Ok(out)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(MatchStatus::Scheduled),
            "live" => Some(MatchStatus::Live),
            "finished" => Some(MatchStatus::Finished),
            "postponed" => Some(MatchStatus::Postponed),
            "cancelled" | "canceled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }
}

/// Per-match statistics. Missing columns read as 0.0 when features are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    #[serde(default)]
    pub home_possession: Option<f64>,
    #[serde(default)]
    pub away_possession: Option<f64>,
    #[serde(default)]
    pub home_shots: Option<f64>,
    #[serde(default)]
    pub away_shots: Option<f64>,
    #[serde(default)]
    pub home_shots_on_target: Option<f64>,
    #[serde(default)]
    pub away_shots_on_target: Option<f64>,
    #[serde(default)]
    pub home_xg: Option<f64>,
    #[serde(default)]
    pub away_xg: Option<f64>,
    #[serde(default)]
    pub home_corners: Option<f64>,
    #[serde(default)]
    pub away_corners: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: u64,
    pub league: String,
    pub kickoff: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
    #[serde(default)]
    pub status: MatchStatus,
    #[serde(default)]
    pub stats: MatchStats,
    #[serde(default)]
    pub odds: Option<OddsQuote>,
}

impl MatchRecord {
    pub fn is_training_eligible(&self) -> bool {
        self.status == MatchStatus::Finished && self.home_score.is_some() && self.away_score.is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        if !self.is_training_eligible() {
            return None;
        }
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return None;
        };
        Some(classify_outcome(home, away))
    }
}

/// Rolling goal-differential form per team.
#[derive(Debug, Clone)]
pub struct FormTracker {
    window: usize,
    by_team: HashMap<String, VecDeque<f64>>,
}

impl Default for FormTracker {
    fn default() -> Self {
        Self::new(FORM_WINDOW)
    }
}

impl FormTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            by_team: HashMap::new(),
        }
    }

    /// Mean goal differential over the team's last `window` matches; 0.0 with no history.
    pub fn form(&self, team: &str) -> f64 {
        match self.by_team.get(team) {
            Some(recent) if !recent.is_empty() => recent.iter().sum::<f64>() / recent.len() as f64,
            _ => 0.0,
        }
    }

    pub fn record(&mut self, home_team: &str, away_team: &str, home_goals: i32, away_goals: i32) {
        let diff = (home_goals - away_goals) as f64;
        self.push(home_team, diff);
        self.push(away_team, -diff);
    }

    fn push(&mut self, team: &str, diff: f64) {
        let recent = self.by_team.entry(team.to_string()).or_default();
        recent.push_back(diff);
        while recent.len() > self.window {
            recent.pop_front();
        }
    }
}

/// Pre-match feature vector from statistics and both sides' recent form.
pub fn match_features(stats: &MatchStats, home_form: f64, away_form: f64) -> FeatureVector {
    let home_possession = stats.home_possession.unwrap_or(0.0);
    let away_possession = stats.away_possession.unwrap_or(0.0);
    let home_shots = stats.home_shots.unwrap_or(0.0);
    let away_shots = stats.away_shots.unwrap_or(0.0);
    let home_xg = stats.home_xg.unwrap_or(0.0);
    let away_xg = stats.away_xg.unwrap_or(0.0);

    FeatureVector::new()
        .with("home_possession", home_possession)
        .with("away_possession", away_possession)
        .with("home_shots", home_shots)
        .with("away_shots", away_shots)
        .with("home_xg", home_xg)
        .with("away_xg", away_xg)
        .with("goal_difference_last5_home", home_form)
        .with("goal_difference_last5_away", away_form)
        .with("possession_difference", home_possession - away_possession)
        .with("shot_difference", home_shots - away_shots)
        .with("xg_difference", home_xg - away_xg)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub match_id: u64,
    pub kickoff: DateTime<Utc>,
    pub features: FeatureVector,
    pub outcome: Outcome,
    pub goal_difference: i32,
    pub total_goals: i32,
}

/// Eligible records in kickoff order with engineered features attached.
///
/// Form for each row only sees matches that kicked off earlier (ties keep input order).
pub fn build_training_rows(history: &[MatchRecord]) -> Vec<TrainingRow> {
    let mut eligible: Vec<&MatchRecord> =
        history.iter().filter(|m| m.is_training_eligible()).collect();
    eligible.sort_by_key(|m| m.kickoff);

    let mut form = FormTracker::default();
    let mut rows = Vec::with_capacity(eligible.len());
    for m in eligible {
        let (Some(outcome), Some(home_goals), Some(away_goals)) =
            (m.outcome(), m.home_score, m.away_score)
        else {
            continue;
        };
        let features = match_features(&m.stats, form.form(&m.home_team), form.form(&m.away_team));
        rows.push(TrainingRow {
            match_id: m.id,
            kickoff: m.kickoff,
            features,
            outcome,
            goal_difference: home_goals - away_goals,
            total_goals: home_goals + away_goals,
        });
        form.record(&m.home_team, &m.away_team, home_goals, away_goals);
    }
    rows
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn record(id: u64, day: u32, home: &str, away: &str, hg: i32, ag: i32) -> MatchRecord {
        MatchRecord {
            id,
            league: "L".to_string(),
            kickoff: Utc.with_ymd_and_hms(2024, 1, day, 15, 0, 0).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: Some(hg),
            away_score: Some(ag),
            status: MatchStatus::Finished,
            stats: MatchStats::default(),
            odds: None,
        }
    }

    #[test]
    fn missing_feature_reads_as_zero() {
        let fv = FeatureVector::new().with("home_xg", 1.4);
        assert_eq!(fv.get_or_zero("home_xg"), 1.4);
        assert_eq!(fv.get_or_zero("away_xg"), 0.0);
        assert_eq!(fv.get("away_xg"), None);
    }

    #[test]
    fn to_row_follows_requested_order() {
        let fv = FeatureVector::new().with("b", 2.0).with("a", 1.0);
        let names = vec!["a".to_string(), "c".to_string(), "b".to_string()];
        assert_eq!(fv.to_row(&names), vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn from_json_rejects_non_mapping_and_empty() {
        assert!(matches!(
            FeatureVector::from_json(&json!([1.0, 2.0])),
            Err(PredictorError::FeatureMismatch { .. })
        ));
        assert!(matches!(
            FeatureVector::from_json(&json!({})),
            Err(PredictorError::FeatureMismatch { .. })
        ));
        assert!(matches!(
            FeatureVector::from_json(&json!({"home_xg": "high"})),
            Err(PredictorError::FeatureMismatch { .. })
        ));
        let fv = FeatureVector::from_json(&json!({"home_xg": 1.2, "away_shots": 9})).unwrap();
        assert_eq!(fv.get_or_zero("away_shots"), 9.0);
    }

    #[test]
    fn form_uses_only_prior_matches_and_caps_window() {
        let mut history = Vec::new();
        // Team A wins its first six matches by one goal, then loses 0-4.
        for i in 0..6u32 {
            history.push(record(i as u64, i + 1, "A", &format!("O{i}"), 1, 0));
        }
        history.push(record(6, 7, "A", "B", 0, 4));
        history.push(record(7, 8, "A", "C", 0, 0));

        let rows = build_training_rows(&history);
        assert_eq!(rows[0].features.get_or_zero("goal_difference_last5_home"), 0.0);
        assert_eq!(rows[1].features.get_or_zero("goal_difference_last5_home"), 1.0);
        assert_eq!(rows[6].features.get_or_zero("goal_difference_last5_home"), 1.0);
        // Window is the last five: four wins by one and the 0-4 loss.
        let expected = (4.0 - 4.0) / 5.0;
        assert!((rows[7].features.get_or_zero("goal_difference_last5_home") - expected).abs() < 1e-12);
    }

    #[test]
    fn away_form_is_from_away_team_perspective() {
        let history = vec![record(1, 1, "A", "B", 3, 1), record(2, 2, "C", "B", 0, 0)];
        let rows = build_training_rows(&history);
        assert_eq!(rows[1].features.get_or_zero("goal_difference_last5_away"), -2.0);
    }

    #[test]
    fn rows_follow_kickoff_order_and_skip_unfinished() {
        let mut late = record(1, 10, "A", "B", 2, 2);
        late.stats.home_xg = Some(1.5);
        late.stats.away_xg = Some(0.5);
        let early = record(2, 3, "B", "A", 0, 1);
        let mut pending = record(3, 5, "A", "B", 0, 0);
        pending.status = MatchStatus::Scheduled;

        assert_eq!(pending.outcome(), None);
        assert_eq!(early.outcome(), Some(Outcome::Away));

        let rows = build_training_rows(&[late, early, pending]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].match_id, 2);
        assert_eq!(rows[0].outcome, Outcome::Away);
        assert_eq!(rows[1].outcome, Outcome::Draw);
        assert_eq!(rows[1].total_goals, 4);
        assert_eq!(rows[1].goal_difference, 0);
        assert!((rows[1].features.get_or_zero("xg_difference") - 1.0).abs() < 1e-12);
    }
}
