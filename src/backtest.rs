use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::{MatchRecord, build_training_rows};
use crate::model::TrainedModel;
use crate::odds::potential_profit;
use crate::predict::{best_outcome, predict};

/// How a model would have fared on a set of finished matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_predictions: usize,
    pub correct_predictions: usize,
    pub accuracy: f64,
    /// Mean probability the model gave its own pick.
    pub mean_pick_probability: f64,
    pub matches_with_odds: usize,
    pub value_bets: usize,
    pub value_bets_won: usize,
    /// Net result of staking one unit on every value bet.
    pub profit_loss: f64,
    pub roi: f64,
}

/// Replays finished matches in kickoff order, scoring each with form built from
/// earlier matches only. Matches without odds count towards accuracy but place no bets.
pub fn evaluate(model: &TrainedModel, records: &[MatchRecord]) -> Result<PerformanceSummary> {
    let odds_by_id: HashMap<u64, _> = records
        .iter()
        .filter_map(|m| m.odds.as_ref().map(|odds| (m.id, odds)))
        .collect();

    let mut summary = PerformanceSummary::default();
    let mut pick_probability_sum = 0.0;

    for row in build_training_rows(records) {
        let odds = odds_by_id.get(&row.match_id).copied();
        let result = predict(model, &row.features, odds)?;
        let Some((pick, prediction)) = best_outcome(&result) else {
            continue;
        };

        summary.total_predictions += 1;
        pick_probability_sum += prediction.probability;
        if pick == row.outcome {
            summary.correct_predictions += 1;
        }

        let Some(odds) = odds else {
            continue;
        };
        summary.matches_with_odds += 1;
        for (outcome, _) in result.value_bets() {
            let Some(price) = odds.get(outcome) else {
                continue;
            };
            summary.value_bets += 1;
            if outcome == row.outcome {
                summary.value_bets_won += 1;
                summary.profit_loss += potential_profit(1.0, price);
            } else {
                summary.profit_loss -= 1.0;
            }
        }
    }

    if summary.total_predictions > 0 {
        let n = summary.total_predictions as f64;
        summary.accuracy = summary.correct_predictions as f64 / n;
        summary.mean_pick_probability = pick_probability_sum / n;
    }
    if summary.value_bets > 0 {
        summary.roi = summary.profit_loss / summary.value_bets as f64;
    }
    Ok(summary)
}
