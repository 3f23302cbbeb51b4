use std::fmt;

use serde::{Deserialize, Serialize};

/// Final result of a match from the home side's perspective.
///
/// Variant order is the fixed priority order `1, X, 2`; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "1")]
    Home,
    #[serde(rename = "X")]
    Draw,
    #[serde(rename = "2")]
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Home => "1",
            Outcome::Draw => "X",
            Outcome::Away => "2",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Outcome::Home),
            "X" | "x" => Some(Outcome::Draw),
            "2" => Some(Outcome::Away),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify_outcome(home_goals: i32, away_goals: i32) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Observed classes in the fixed `1, X, 2` order.
pub fn observed_classes(outcomes: &[Outcome]) -> Vec<Outcome> {
    Outcome::ALL
        .into_iter()
        .filter(|class| outcomes.contains(class))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_outcome_uses_home_perspective() {
        assert_eq!(classify_outcome(2, 1), Outcome::Home);
        assert_eq!(classify_outcome(1, 1), Outcome::Draw);
        assert_eq!(classify_outcome(0, 3), Outcome::Away);
    }

    #[test]
    fn labels_round_trip_through_parser() {
        for outcome in Outcome::ALL {
            assert_eq!(Outcome::from_label(outcome.label()), Some(outcome));
        }
        assert_eq!(Outcome::from_label("draw"), None);
    }

    #[test]
    fn observed_classes_keep_priority_order() {
        let seen = observed_classes(&[Outcome::Away, Outcome::Home, Outcome::Away]);
        assert_eq!(seen, vec![Outcome::Home, Outcome::Away]);
    }

    #[test]
    fn serializes_as_market_label() {
        let json = serde_json::to_string(&Outcome::Draw).unwrap();
        assert_eq!(json, "\"X\"");
    }
}
