use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use ev_predictor::backtest;
use ev_predictor::config::PredictorConfig;
use ev_predictor::history;
use ev_predictor::model::{Algorithm, ModelKey};
use ev_predictor::registry::{Fallback, ModelRegistry};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = PredictorConfig::from_env();
    let league = arg_value("league")
        .ok_or_else(|| anyhow!("usage: backtest --league=<name> [--algorithm=<name>] [--limit=<n>]"))?;
    let algorithm = match arg_value("algorithm") {
        Some(raw) => raw.parse::<Algorithm>()?,
        None => config.algorithm,
    };
    let limit = arg_value("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(config.history_limit);
    let db_path = arg_value("db")
        .map(PathBuf::from)
        .or(config.db_path)
        .context("unable to resolve sqlite path")?;
    let model_dir = arg_value("model-dir")
        .map(PathBuf::from)
        .or(config.model_dir)
        .context("unable to resolve model directory")?;

    let conn = history::open_db(&db_path)?;
    let records = history::load_training_history(&conn, &league, limit)?;
    let registry = ModelRegistry::with_artifact_dir(model_dir);
    let key = ModelKey::new(&league, algorithm);
    let model = registry.resolve(&key, Fallback::None)?;

    let summary = backtest::evaluate(&model, &records)?;
    println!("Backtest {key} (trained {})", model.trained_at.to_rfc3339());
    println!(
        "Predictions: {}/{} correct ({:.1}%)",
        summary.correct_predictions,
        summary.total_predictions,
        summary.accuracy * 100.0
    );
    println!("Mean pick probability: {:.3}", summary.mean_pick_probability);
    println!(
        "Value bets: {} on {} priced matches, {} won",
        summary.value_bets, summary.matches_with_odds, summary.value_bets_won
    );
    println!(
        "Flat-stake P/L: {:+.2} units (ROI {:+.1}%)",
        summary.profit_loss,
        summary.roi * 100.0
    );
    Ok(())
}

fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("--{name}=");
    let flag = format!("--{name}");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
