//! Locates and loads the [`Config`] the workbench is built from.
use anyhow::{Context, Result};
use directories::ProjectDirs;
use grinvoke_core::Config;
use std::path::{Path, PathBuf};

/// Loads `explicit` when given. Otherwise loads `config.json` from the platform config
/// directory, falling back to defaults when there's no such file.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path).with_context(|| format!("Failed to load '{}'", path.display()));
    }

    match default_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "loading config");
            Config::load(&path).with_context(|| format!("Failed to load '{}'", path.display()))
        }
        _ => Ok(Config::default()),
    }
}

fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "grinvoke", "grinvoke").map(|dirs| dirs.config_dir().join("config.json"))
}
