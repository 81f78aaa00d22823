// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::ConfigFile;
use crate::types::ConverterKind;

/// Command-line arguments for `agentpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agentpipe",
    version,
    about = "Run a coding agent on a prompt with a deadline and capture its stream-JSON output.",
    long_about = None
)]
pub struct CliArgs {
    /// Optional TOML config file; flags below override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Inline prompt text.
    #[arg(long, value_name = "TEXT", conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Path to a prepared prompt file.
    #[arg(long, value_name = "PATH")]
    pub prompt_file: Option<PathBuf>,

    #[arg(long, value_name = "TOOLS")]
    pub allowed_tools: Option<String>,

    #[arg(long, value_name = "TOOLS")]
    pub disallowed_tools: Option<String>,

    /// Positive integer; validated before anything runs.
    #[arg(long, value_name = "N")]
    pub max_turns: Option<String>,

    #[arg(long, value_name = "JSON_OR_PATH")]
    pub mcp_config: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub system_prompt: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub append_system_prompt: Option<String>,

    #[arg(long, value_name = "MODEL")]
    pub fallback_model: Option<String>,

    /// Positive integer; defaults to 10 minutes.
    #[arg(long, value_name = "MINUTES")]
    pub timeout_minutes: Option<String>,

    /// Extra environment for the agent, one `KEY: VALUE` per line.
    #[arg(long, value_name = "BLOCK")]
    pub agent_env: Option<String>,

    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    #[arg(long, value_name = "KEY")]
    pub anthropic_api_key: Option<String>,

    #[arg(long, value_name = "TOKEN")]
    pub claude_code_oauth_token: Option<String>,

    #[arg(long)]
    pub use_bedrock: bool,

    #[arg(long)]
    pub use_vertex: bool,

    #[arg(long, value_name = "REGION")]
    pub aws_region: Option<String>,

    #[arg(long, value_name = "PROJECT")]
    pub gcp_project_id: Option<String>,

    #[arg(long, value_name = "REGION")]
    pub gcp_region: Option<String>,

    /// Agent executable (default: `claude`).
    #[arg(long, value_name = "PATH")]
    pub agent_bin: Option<String>,

    /// Directory for the prompt channel, output buffer and metrics file.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Seconds between SIGTERM and SIGKILL after a timeout.
    #[arg(long, value_name = "SECS")]
    pub grace_seconds: Option<u64>,

    /// Metrics conversion backend: `native` or `jq`.
    #[arg(long, value_name = "KIND")]
    pub converter: Option<ConverterKind>,

    /// Leave the agent's settings.json untouched.
    #[arg(long)]
    pub skip_settings: bool,

    /// Write a JSON run report to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AGENTPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate and print the agent command line, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliArgs {
    /// Overlay every flag that was given onto `cfg`.
    pub fn apply_to(&self, cfg: &mut ConfigFile) {
        override_with(&mut cfg.prompt.text, &self.prompt);
        override_with(&mut cfg.prompt.file, &self.prompt_file);

        let options = &mut cfg.options;
        override_with(&mut options.allowed_tools, &self.allowed_tools);
        override_with(&mut options.disallowed_tools, &self.disallowed_tools);
        override_with(&mut options.max_turns, &self.max_turns);
        override_with(&mut options.mcp_config, &self.mcp_config);
        override_with(&mut options.system_prompt, &self.system_prompt);
        override_with(&mut options.append_system_prompt, &self.append_system_prompt);
        override_with(&mut options.fallback_model, &self.fallback_model);
        override_with(&mut options.timeout_minutes, &self.timeout_minutes);
        override_with(&mut options.agent_env, &self.agent_env);

        let provider = &mut cfg.provider;
        override_with(&mut provider.model, &self.model);
        override_with(&mut provider.anthropic_api_key, &self.anthropic_api_key);
        override_with(
            &mut provider.claude_code_oauth_token,
            &self.claude_code_oauth_token,
        );
        provider.use_bedrock |= self.use_bedrock;
        provider.use_vertex |= self.use_vertex;
        override_with(&mut provider.aws_region, &self.aws_region);
        override_with(&mut provider.gcp_project_id, &self.gcp_project_id);
        override_with(&mut provider.gcp_region, &self.gcp_region);

        let runtime = &mut cfg.runtime;
        if let Some(bin) = &self.agent_bin {
            runtime.agent_bin = bin.clone();
        }
        override_with(&mut runtime.work_dir, &self.work_dir);
        if let Some(secs) = self.grace_seconds {
            runtime.grace_seconds = secs;
        }
        if let Some(kind) = self.converter {
            runtime.converter = kind;
        }
        runtime.skip_settings |= self.skip_settings;
    }
}

fn override_with<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
