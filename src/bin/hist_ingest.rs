use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use ev_predictor::config::PredictorConfig;
use ev_predictor::features::MatchRecord;
use ev_predictor::history;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = PredictorConfig::from_env();
    let input = arg_value("input")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("usage: hist_ingest --input=<matches.json> [--db=<path>]"))?;
    let db_path = arg_value("db")
        .map(PathBuf::from)
        .or(config.db_path)
        .context("unable to resolve sqlite path")?;

    let raw = fs::read_to_string(&input).with_context(|| format!("read {}", input.display()))?;
    let records = parse_records(&raw).with_context(|| format!("parse {}", input.display()))?;
    if records.is_empty() {
        return Err(anyhow!("no match records in {}", input.display()));
    }

    let mut conn = history::open_db(&db_path)?;
    let written = history::upsert_matches(&mut conn, &records)?;
    info!(db = %db_path.display(), written, "history ingest complete");

    println!("History ingest complete");
    println!("DB: {}", db_path.display());
    println!("Matches upserted: {written}");
    for league in history::league_names(&conn)? {
        let finished = history::load_training_history(&conn, &league, usize::MAX >> 1)?;
        println!("league {league}: finished={}", finished.len());
    }
    Ok(())
}

/// Accepts either a JSON array of records or one record per line.
fn parse_records(raw: &str) -> Result<Vec<MatchRecord>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str::<MatchRecord>(line)
            .with_context(|| format!("line {}", idx + 1))?;
        out.push(record);
    }
    Ok(out)
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
