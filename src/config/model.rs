// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::DEFAULT_GRACE;
use crate::types::ConverterKind;

/// Top-level configuration as read from an optional TOML file.
///
/// ```toml
/// [prompt]
/// file = "prompt.md"
///
/// [options]
/// allowed_tools = "Bash,Edit"
/// max_turns = "8"
/// timeout_minutes = "15"
/// agent_env = """
/// # comments are ignored
/// FEATURE_FLAG: on
/// """
///
/// [provider]
/// anthropic_api_key = "sk-..."
///
/// [runtime]
/// agent_bin = "claude"
/// converter = "native"
/// ```
///
/// All sections are optional; CLI flags override anything set here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub prompt: PromptSection,

    #[serde(default)]
    pub options: RunOptions,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// `[prompt]` section. Exactly one of `text` and `file` must end up set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptSection {
    /// Inline prompt text; written to the work directory before the run.
    #[serde(default)]
    pub text: Option<String>,

    /// Path to an already-prepared prompt file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// `[options]` section: the agent options record.
///
/// Values are kept as strings, exactly as a pipeline would hand them over;
/// numeric fields are validated by [`crate::config::prepare_run_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub allowed_tools: Option<String>,
    #[serde(default)]
    pub disallowed_tools: Option<String>,
    #[serde(default)]
    pub max_turns: Option<String>,
    #[serde(default)]
    pub mcp_config: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub append_system_prompt: Option<String>,
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default)]
    pub timeout_minutes: Option<String>,

    /// Multi-line `KEY: VALUE` block of extra environment variables.
    #[serde(default)]
    pub agent_env: Option<String>,
}

/// `[provider]` section: credentials and backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub claude_code_oauth_token: Option<String>,
    #[serde(default)]
    pub use_bedrock: bool,
    #[serde(default)]
    pub use_vertex: bool,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub gcp_project_id: Option<String>,
    #[serde(default)]
    pub gcp_region: Option<String>,
}

/// `[runtime]` section: how the orchestrator itself behaves.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// Agent executable, resolved through `PATH` when not absolute.
    #[serde(default = "default_agent_bin")]
    pub agent_bin: String,

    /// Directory for the channel, buffer and metrics files.
    ///
    /// If `None`, `RUNNER_TEMP` is used, then the OS temp directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Seconds between SIGTERM and SIGKILL once the deadline fires.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: u64,

    #[serde(default)]
    pub converter: ConverterKind,

    /// Do not touch the agent's `settings.json`.
    #[serde(default)]
    pub skip_settings: bool,
}

fn default_agent_bin() -> String {
    "claude".to_string()
}

fn default_grace_seconds() -> u64 {
    DEFAULT_GRACE.as_secs()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            agent_bin: default_agent_bin(),
            work_dir: None,
            grace_seconds: default_grace_seconds(),
            converter: ConverterKind::default(),
            skip_settings: false,
        }
    }
}
