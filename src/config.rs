use crate::model::EngineSettings;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const APP_DIR: &str = "spinstats";
const SETTINGS_FILE: &str = "settings.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("SPINSTATS_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<EngineSettings> {
    let path = settings_path()?;
    load_settings_from_path(&path)
}

pub fn save_settings(settings: &EngineSettings) -> Result<()> {
    ensure_config_dir()?;
    let path = settings_path()?;
    save_settings_to_path(&path, settings)
}

/// Loads settings, writing the defaults first when no settings file exists.
pub fn load_or_init_settings() -> Result<EngineSettings> {
    let path = settings_path()?;
    if path.exists() {
        return load_settings();
    }
    let settings = EngineSettings::default();
    save_settings(&settings)?;
    info!(path = %path.display(), "wrote default settings");
    Ok(settings)
}

fn load_settings_from_path(path: &Path) -> Result<EngineSettings> {
    if !path.exists() {
        return Ok(EngineSettings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: EngineSettings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

fn save_settings_to_path(path: &Path, settings: &EngineSettings) -> Result<()> {
    if path.exists() {
        let backup = path.with_extension("json.bak");
        let _ = fs::copy(path, &backup);
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
