use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths;

/// Root configuration structure for deckhand.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Host aliases to deploy to, resolved against the SSH client config.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Glob pattern matching the locally built artifact(s).
    pub artifact: String,

    /// Remote directory artifacts are uploaded into. "~" means the login home.
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Install command template. Rendered with {{artifact}}, {{artifacts}}
    /// and {{remoteDir}} before running on each target.
    pub install_command: String,

    #[serde(default)]
    pub build: BuildConfig,

    /// Override path to the SSH client config (defaults to ~/.ssh/config).
    #[serde(default)]
    pub ssh_config: Option<String>,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Overall deadline for a deploy run. Unfinished targets are reported
    /// as timed out once it passes.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Commands run in sequence; the first failure aborts the build.
    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default)]
    pub work_dir: Option<String>,

    /// Remove existing artifact-glob matches before building so a failed
    /// build cannot deploy a stale package.
    #[serde(default = "default_true")]
    pub clean_stale: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            work_dir: None,
            clean_stale: true,
        }
    }
}

fn default_remote_dir() -> String {
    "~".to_string()
}

fn default_max_parallel() -> usize {
    4
}

fn default_true() -> bool {
    true
}

/// Load configuration, searching: explicit --config path, ./deckhand.json,
/// then ~/.config/deckhand/deckhand.json.
pub fn load(explicit: Option<&str>) -> Result<(Config, PathBuf)> {
    let path = resolve_config_path(explicit)?;
    let config = load_from_path(&path)?;
    Ok((config, path))
}

fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        let expanded = shellexpand::tilde(p).to_string();
        let path = PathBuf::from(&expanded);
        if !path.exists() {
            return Err(Error::config_missing(vec![expanded]));
        }
        return Ok(path);
    }

    let local = PathBuf::from("deckhand.json");
    if local.exists() {
        return Ok(local);
    }

    let global = paths::deckhand_json()?;
    if global.exists() {
        return Ok(global);
    }

    Err(Error::config_missing(vec![
        local.display().to_string(),
        global.display().to_string(),
    ]))
}

fn validate(config: &Config) -> Result<()> {
    if config.artifact.trim().is_empty() {
        return Err(Error::config_invalid_value(
            "artifact",
            None,
            "Artifact glob must not be empty",
        ));
    }
    if config.install_command.trim().is_empty() {
        return Err(Error::config_invalid_value(
            "installCommand",
            None,
            "Install command must not be empty",
        ));
    }
    if config.max_parallel == 0 {
        return Err(Error::config_invalid_value(
            "maxParallel",
            Some("0".to_string()),
            "Must be at least 1",
        ));
    }
    Ok(())
}

/// Effective SSH client config path for a loaded configuration.
pub fn ssh_config_path(config: &Config) -> Result<PathBuf> {
    match &config.ssh_config {
        Some(p) if !p.is_empty() => Ok(PathBuf::from(shellexpand::tilde(p).to_string())),
        _ => paths::ssh_config(),
    }
}

/// Read a config from an explicit file path, bypassing the search order.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    validate(&config)?;
    Ok(config)
}
