use anyhow::{anyhow, Context, Result};
use serde_json::Value as Json;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "metaform.config.json";

/// Configuration file to load: the explicit path, else the default name in
/// the working directory
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) if path.is_dir() => path.join(DEFAULT_CONFIG_NAME),
        Some(path) => path.to_path_buf(),
        None => cwd.join(DEFAULT_CONFIG_NAME),
    };
    if !path.exists() {
        return Err(anyhow!("Configuration not found: {}", path.display()));
    }
    Ok(path)
}

/// Read a JSON input file such as an answer set or a context binding
pub fn read_json(path: &Path) -> Result<Json> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Parse a `path=value` command-line pair
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected <path>=<value>, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Empty field path in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
