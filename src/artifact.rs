use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{MODEL_FORMAT_VERSION, ModelKey, TrainedModel};

const ARTIFACT_FORMAT: &str = "ev_predictor.model";

/// On-disk envelope. The checksum covers the serialized `model` payload.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactFile<M> {
    format: String,
    version: u32,
    checksum: String,
    model: M,
}

/// `<dir>/<slug>.json`; see [`ModelKey::slug`] for the stem.
pub fn artifact_path(dir: &Path, key: &ModelKey) -> PathBuf {
    dir.join(format!("{}.json", key.slug()))
}

/// Writes the model next to its siblings via a temp file and rename.
pub fn save_model(dir: &Path, model: &TrainedModel) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create model dir {}", dir.display()))?;
    let path = artifact_path(dir, &model.key);
    let file = ArtifactFile {
        format: ARTIFACT_FORMAT.to_string(),
        version: MODEL_FORMAT_VERSION,
        checksum: checksum(model)?,
        model,
    };
    let json = serde_json::to_string(&file).context("serialize model artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
    Ok(path)
}

pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: ArtifactFile<TrainedModel> =
        serde_json::from_str(&raw).with_context(|| format!("decode {}", path.display()))?;

    if file.format != ARTIFACT_FORMAT {
        return Err(anyhow!("unexpected artifact format '{}'", file.format));
    }
    if file.version != MODEL_FORMAT_VERSION {
        return Err(anyhow!(
            "artifact version {} is not supported (expected {MODEL_FORMAT_VERSION})",
            file.version
        ));
    }
    let actual = checksum(&file.model)?;
    if actual != file.checksum {
        return Err(anyhow!("checksum mismatch"));
    }
    file.model
        .validate()
        .map_err(|reason| anyhow!("inconsistent model: {reason}"))?;
    Ok(file.model)
}

/// Loads the artifact stored for `key`, `Ok(None)` when none exists yet.
pub fn load_for_key(dir: &Path, key: &ModelKey) -> Result<Option<TrainedModel>> {
    let path = artifact_path(dir, key);
    if !path.exists() {
        return Ok(None);
    }
    let model = load_model(&path)?;
    if model.key != *key {
        return Err(anyhow!(
            "{} holds a model for {}, not {key}",
            path.display(),
            model.key
        ));
    }
    Ok(Some(model))
}

fn checksum(model: &TrainedModel) -> Result<String> {
    let payload = serde_json::to_vec(model).context("serialize model payload")?;
    Ok(STANDARD.encode(Sha256::digest(&payload)))
}
