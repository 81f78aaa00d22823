// src/settings.rs

//! Agent `settings.json` preparation.
//!
//! Project MCP servers are only picked up by the agent when
//! `enableAllProjectMcpServers` is set, so the flag is merged into the
//! existing settings before each run. Other keys are left alone.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::Result;

/// `$XDG_CONFIG_HOME/claude` if set, else `$HOME/.claude`.
pub fn agent_config_dir(xdg_config_home: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    match xdg_config_home.filter(|p| !p.as_os_str().is_empty()) {
        Some(xdg) => Some(xdg.join("claude")),
        None => home.map(|h| h.join(".claude")),
    }
}

/// Merge `enableAllProjectMcpServers = true` into `<config_dir>/settings.json`.
///
/// Returns the settings path.
pub fn ensure_agent_settings(config_dir: &Path) -> Result<PathBuf> {
    let settings_path = config_dir.join("settings.json");
    info!(path = ?settings_path, "setting up agent settings");

    fs::create_dir_all(config_dir)
        .with_context(|| format!("creating agent config dir {:?}", config_dir))?;

    let mut settings = read_settings(&settings_path);
    settings.insert("enableAllProjectMcpServers".to_string(), Value::Bool(true));

    let json = serde_json::to_string_pretty(&Value::Object(settings))?;
    fs::write(&settings_path, json)
        .with_context(|| format!("writing agent settings {:?}", settings_path))?;

    debug!(path = ?settings_path, "agent settings saved");
    Ok(settings_path)
}

fn read_settings(path: &Path) -> Map<String, Value> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            debug!(path = ?path, "no existing settings file; creating a new one");
            return Map::new();
        }
    };

    if contents.trim().is_empty() {
        debug!(path = ?path, "settings file exists but is empty");
        return Map::new();
    }

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = ?path, "settings file is not a JSON object; replacing it");
            Map::new()
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "error reading existing settings; replacing them");
            Map::new()
        }
    }
}
