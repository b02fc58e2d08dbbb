use std::fs;
use std::path::Path;

use crate::core::config::RenderConfig;
use crate::core::error::RenderError;

pub const PRESET_EXT: &str = ".c4drs.json";

pub fn to_json(cfg: &RenderConfig) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(cfg)?;
    json.push('\n');
    Ok(json)
}

pub fn from_json(json: &str) -> Result<RenderConfig, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn save(path: &Path, cfg: &RenderConfig) -> Result<(), RenderError> {
    let json = to_json(cfg).map_err(|source| RenderError::PresetFormat {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| RenderError::PresetIo {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "preset saved");
    Ok(())
}

/// Reads a preset, replacing the whole config. Keys absent from the file keep
/// their default values and unknown keys are ignored.
pub fn load(path: &Path) -> Result<RenderConfig, RenderError> {
    let json = fs::read_to_string(path).map_err(|source| RenderError::PresetIo {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = from_json(&json).map_err(|source| RenderError::PresetFormat {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "preset loaded");
    Ok(cfg)
}

/// `<scene stem>.c4drs.json`, or `preset.c4drs.json` without a scene.
pub fn suggested_file_name(cfg: &RenderConfig) -> String {
    let stem = Path::new(&cfg.scene_path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("preset");
    format!("{stem}{PRESET_EXT}")
}
