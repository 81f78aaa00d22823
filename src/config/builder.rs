// src/config/builder.rs

//! Turn a [`RunOptions`] record into the argv/environment of one agent run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::env_block::parse_custom_env;
use crate::config::model::RunOptions;
use crate::errors::{AgentpipeError, Result};

/// Flags every run starts with: non-interactive, verbose, streaming JSON.
pub const BASE_ARGS: [&str; 4] = ["-p", "--verbose", "--output-format", "stream-json"];

/// Deadline applied when `timeout_minutes` is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Everything needed to launch the agent, built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedConfig {
    pub argv: Vec<String>,
    pub prompt_path: PathBuf,
    pub env_overlay: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Validate `options` and build the [`PreparedConfig`] for `prompt_path`.
///
/// Pure: no file is touched and nothing is spawned, so a validation error
/// leaves no side effects behind.
pub fn prepare_run_config(prompt_path: &Path, options: &RunOptions) -> Result<PreparedConfig> {
    let max_turns = options
        .max_turns
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(|raw| positive_number("maxTurns", raw))
        .transpose()?;

    let timeout_minutes = options
        .timeout_minutes
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            positive_number("timeoutMinutes", raw)?
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    AgentpipeError::ConfigError(format!(
                        "timeoutMinutes is too large, got: {raw}"
                    ))
                })
        })
        .transpose()?;

    let mut argv: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();

    push_flag(&mut argv, "--allowedTools", options.allowed_tools.as_deref());
    push_flag(&mut argv, "--disallowedTools", options.disallowed_tools.as_deref());
    if let Some(turns) = max_turns {
        argv.push("--max-turns".to_string());
        argv.push(turns.to_string());
    }
    push_flag(&mut argv, "--mcp-config", options.mcp_config.as_deref());
    push_flag(&mut argv, "--system-prompt", options.system_prompt.as_deref());
    push_flag(
        &mut argv,
        "--append-system-prompt",
        options.append_system_prompt.as_deref(),
    );
    push_flag(&mut argv, "--fallback-model", options.fallback_model.as_deref());

    let timeout = timeout_minutes.unwrap_or(DEFAULT_TIMEOUT);

    Ok(PreparedConfig {
        argv,
        prompt_path: prompt_path.to_path_buf(),
        env_overlay: parse_custom_env(options.agent_env.as_deref()),
        timeout,
    })
}

fn push_flag(argv: &mut Vec<String>, flag: &str, value: Option<&str>) {
    match value {
        Some(v) if !v.is_empty() => {
            argv.push(flag.to_string());
            argv.push(v.to_string());
        }
        _ => {}
    }
}

fn positive_number(name: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as u64),
        _ => Err(AgentpipeError::ConfigError(format!(
            "{name} must be a positive number, got: {raw}"
        ))),
    }
}
