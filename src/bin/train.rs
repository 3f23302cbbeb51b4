use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{info, warn};

use ev_predictor::config::PredictorConfig;
use ev_predictor::history;
use ev_predictor::model::{Algorithm, ModelKey};
use ev_predictor::registry::ModelRegistry;
use ev_predictor::{PredictorError, TrainConfig};

const ALL_ALGORITHMS: [Algorithm; 3] = [
    Algorithm::GradientBoostedTrees,
    Algorithm::RandomForest,
    Algorithm::GradientBoosting,
];

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = PredictorConfig::from_env();
    let db_path = arg_value("db")
        .map(PathBuf::from)
        .or(config.db_path.clone())
        .context("unable to resolve sqlite path")?;
    let model_dir = arg_value("model-dir")
        .map(PathBuf::from)
        .or(config.model_dir.clone())
        .context("unable to resolve model directory")?;
    let limit = arg_value("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(config.history_limit);
    let force = has_flag("force");

    let algorithms: Vec<Algorithm> = if has_flag("all-algorithms") {
        ALL_ALGORITHMS.to_vec()
    } else {
        match arg_value("algorithm") {
            Some(raw) => vec![raw.parse::<Algorithm>()?],
            None => vec![config.algorithm],
        }
    };

    let conn = history::open_db(&db_path)?;
    let leagues = match arg_value("league") {
        Some(league) => vec![league],
        None => history::league_names(&conn)?,
    };
    if leagues.is_empty() {
        return Err(anyhow!("no leagues in {}", db_path.display()));
    }

    let registry = ModelRegistry::with_artifact_dir(&model_dir);
    let train_config: TrainConfig = config.train_config();
    let now = Utc::now();
    let mut trained = 0usize;

    for league in &leagues {
        let records = history::load_training_history(&conn, league, limit)?;
        for algorithm in &algorithms {
            let key = ModelKey::new(league, *algorithm);
            if !force
                && let Some(current) = registry.get(&key)?
                && !current.is_stale(now, config.retrain_max_age())
            {
                info!(key = %key, trained_at = %current.trained_at, "model is fresh, skipping");
                continue;
            }

            match registry.retrain(&key, &records, &train_config) {
                Ok(model) => {
                    trained += 1;
                    let m = &model.metrics;
                    println!(
                        "{key}: accuracy={:.3} precision={:.3} recall={:.3} f1={:.3} brier={:.3} log_loss={:.3} (train={} test={})",
                        m.accuracy,
                        m.precision,
                        m.recall,
                        m.f1_score,
                        m.brier,
                        m.log_loss,
                        m.train_samples,
                        m.test_samples
                    );
                }
                Err(PredictorError::InsufficientData {
                    available,
                    required,
                }) => {
                    warn!(key = %key, available, required, "skipped");
                    println!("{key}: skipped ({available}/{required} matches)");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    println!("Models trained: {trained}");
    println!("Artifacts: {}", model_dir.display());
    Ok(())
}

fn has_flag(name: &str) -> bool {
    let flag = format!("--{name}");
    std::env::args().skip(1).any(|arg| arg == flag)
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
