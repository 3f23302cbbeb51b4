use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};

use ev_predictor::config::PredictorConfig;
use ev_predictor::model::{Algorithm, ModelKey};
use ev_predictor::registry::{Fallback, ModelRegistry};
use ev_predictor::{FeatureVector, OddsQuote, best_outcome};

const USAGE: &str = "usage: predict --league=<name> --features=<json or file> \
                     [--odds=<home,draw,away>] [--algorithm=<name>] [--uniform-fallback]";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = PredictorConfig::from_env();
    let league = arg_value("league").ok_or_else(|| anyhow!(USAGE))?;
    let algorithm = match arg_value("algorithm") {
        Some(raw) => raw.parse::<Algorithm>()?,
        None => config.algorithm,
    };
    let features_arg = arg_value("features").ok_or_else(|| anyhow!(USAGE))?;
    let features = FeatureVector::from_json(&read_json_arg(&features_arg)?)?;
    let odds = arg_value("odds").map(|raw| parse_odds(&raw)).transpose()?;
    let fallback = if has_flag("uniform-fallback") {
        Fallback::Uniform
    } else {
        Fallback::None
    };

    let model_dir = arg_value("model-dir")
        .map(PathBuf::from)
        .or(config.model_dir)
        .context("unable to resolve model directory")?;
    let registry = ModelRegistry::with_artifact_dir(model_dir);
    let key = ModelKey::new(&league, algorithm);
    let result = registry.predict(&key, &features, odds.as_ref(), fallback)?;

    let best = best_outcome(&result).map(|(outcome, p)| {
        json!({
            "outcome": outcome,
            "probability": p.probability,
            "confidence": p.confidence,
        })
    });
    let out = json!({
        "league": key.league,
        "algorithm": key.algorithm,
        "predictions": result,
        "best": best,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Inline JSON when the argument starts with `{`, otherwise a path to a JSON file.
fn read_json_arg(raw: &str) -> Result<Value> {
    if raw.trim_start().starts_with('{') {
        return serde_json::from_str(raw).context("parse inline features json");
    }
    let path = Path::new(raw);
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

fn parse_odds(raw: &str) -> Result<OddsQuote> {
    let prices = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("bad odds '{raw}'"))?;
    let [home, draw, away] = prices[..] else {
        return Err(anyhow!("expected three prices home,draw,away; got '{raw}'"));
    };
    Ok(OddsQuote::from_1x2(home, draw, away)?)
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
