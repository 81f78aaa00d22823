// src/exec/supervisor.rs

//! Spawning and observing the agent process.

use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use anyhow::anyhow;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{PreparedConfig, ProviderSettings};
use crate::errors::{AgentpipeError, Result};

/// Lifecycle of the supervised process as seen by its waiter task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(i32),
    Signaled(i32),
    /// Waiting on the process failed; its fate is unknown.
    Failed(String),
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessState::Running)
    }

    fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ProcessState::Exited(code),
            (None, Some(sig)) => ProcessState::Signaled(sig),
            (None, None) => ProcessState::Failed(format!("unrecognised exit status: {status}")),
        }
    }
}

/// Environment variables the orchestrator controls.
///
/// These are applied after the caller's overlay, so they always win.
pub fn orchestrator_env(
    provider: &ProviderSettings,
    inherited_aws_region: Option<String>,
) -> BTreeMap<String, String> {
    let flag = |on: bool| if on { "1" } else { "" }.to_string();
    let text = |v: &Option<String>| v.clone().unwrap_or_default();

    let aws_region = provider
        .aws_region
        .clone()
        .filter(|r| !r.is_empty())
        .or(inherited_aws_region)
        .unwrap_or_default();

    BTreeMap::from([
        ("CLAUDE_CODE_ACTION".to_string(), "1".to_string()),
        ("ANTHROPIC_MODEL".to_string(), text(&provider.model)),
        ("ANTHROPIC_API_KEY".to_string(), text(&provider.anthropic_api_key)),
        (
            "CLAUDE_CODE_OAUTH_TOKEN".to_string(),
            text(&provider.claude_code_oauth_token),
        ),
        ("CLAUDE_CODE_USE_BEDROCK".to_string(), flag(provider.use_bedrock)),
        ("CLAUDE_CODE_USE_VERTEX".to_string(), flag(provider.use_vertex)),
        ("AWS_REGION".to_string(), aws_region),
        (
            "ANTHROPIC_VERTEX_PROJECT_ID".to_string(),
            text(&provider.gcp_project_id),
        ),
        ("CLOUD_ML_REGION".to_string(), text(&provider.gcp_region)),
    ])
}

/// Merge the caller overlay with the orchestrator variables; the latter win.
pub fn compose_env(
    overlay: &BTreeMap<String, String>,
    fixed: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = overlay.clone();
    env.extend(fixed.iter().map(|(k, v)| (k.clone(), v.clone())));
    env
}

/// Signal capability over a supervised process; does not own it.
#[derive(Debug, Clone, Copy)]
pub struct Terminator {
    pid: Pid,
}

impl Terminator {
    /// SIGTERM.
    pub fn graceful(&self) -> nix::Result<()> {
        kill(self.pid, Signal::SIGTERM)
    }

    /// SIGKILL.
    pub fn force(&self) -> nix::Result<()> {
        kill(self.pid, Signal::SIGKILL)
    }
}

/// Handle to a spawned agent process.
///
/// The `Child` itself lives in a waiter task which publishes
/// [`ProcessState`] transitions; this handle keeps the pipes and a state
/// receiver.
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: u32,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    state: watch::Receiver<ProcessState>,
    waiter: JoinHandle<()>,
}

impl SupervisedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn state(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    pub fn terminator(&self) -> Terminator {
        Terminator {
            pid: Pid::from_raw(self.pid as i32),
        }
    }

    /// Wait for the waiter task to observe the exit.
    pub async fn wait(self) -> ProcessState {
        let _ = self.waiter.await;
        self.state.borrow().clone()
    }
}

/// Spawn `program` with the prepared argv and composed environment.
///
/// - stdin is piped; the prompt feeder writes into it.
/// - stdout is piped for the reformatter.
/// - stderr is inherited.
pub fn spawn_agent(
    program: &str,
    prepared: &PreparedConfig,
    fixed_env: &BTreeMap<String, String>,
) -> Result<SupervisedProcess> {
    info!(program, args = ?prepared.argv, "starting agent process");

    let mut cmd = Command::new(program);
    cmd.args(&prepared.argv)
        .envs(compose_env(&prepared.env_overlay, fixed_env))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| AgentpipeError::SpawnError {
        program: program.to_string(),
        source,
    })?;

    let pid = child
        .id()
        .ok_or_else(|| AgentpipeError::Other(anyhow!("agent process exited before it had a pid")))?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();

    let (state_tx, state_rx) = watch::channel(ProcessState::Running);

    let waiter = tokio::spawn(async move {
        let next = match child.wait().await {
            Ok(status) => ProcessState::from_status(status),
            Err(e) => {
                warn!(pid, error = %e, "failed waiting for agent process");
                ProcessState::Failed(e.to_string())
            }
        };
        info!(pid, state = ?next, "agent process finished");
        state_tx.send_replace(next);
    });

    debug!(pid, "agent process spawned");

    Ok(SupervisedProcess {
        pid,
        stdin,
        stdout,
        state: state_rx,
        waiter,
    })
}
