#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentpipe::config::{ProviderSettings, RunOptions, prepare_run_config};
use agentpipe::engine::{MetricsConverter, RunPaths, RunPlan, SlurpConverter};
use agentpipe::exec::orchestrator_env;

/// Builder for `RunPlan` to simplify test setup.
///
/// Defaults: no options, default provider settings, 1s grace, native
/// metrics conversion. `timeout` overrides the minute-granular value from
/// `RunOptions` so tests can time out quickly.
pub struct RunPlanBuilder {
    work_dir: PathBuf,
    agent_bin: String,
    prompt_path: PathBuf,
    options: RunOptions,
    provider: ProviderSettings,
    timeout: Option<Duration>,
    grace: Duration,
    converter: Box<dyn MetricsConverter>,
}

impl RunPlanBuilder {
    pub fn new(work_dir: &Path, agent_bin: &Path, prompt_path: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            agent_bin: agent_bin.to_string_lossy().into_owned(),
            prompt_path: prompt_path.to_path_buf(),
            options: RunOptions::default(),
            provider: ProviderSettings::default(),
            timeout: None,
            grace: Duration::from_secs(1),
            converter: Box::new(SlurpConverter),
        }
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn agent_env(mut self, block: &str) -> Self {
        self.options.agent_env = Some(block.to_string());
        self
    }

    pub fn provider(mut self, provider: ProviderSettings) -> Self {
        self.provider = provider;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn converter(mut self, converter: Box<dyn MetricsConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn build(self) -> RunPlan {
        let mut prepared = prepare_run_config(&self.prompt_path, &self.options)
            .expect("Failed to build valid run config from builder");
        if let Some(timeout) = self.timeout {
            prepared.timeout = timeout;
        }

        RunPlan {
            prepared,
            agent_bin: self.agent_bin,
            fixed_env: orchestrator_env(&self.provider, None),
            grace: self.grace,
            paths: RunPaths::in_dir(&self.work_dir),
            converter: self.converter,
        }
    }
}
