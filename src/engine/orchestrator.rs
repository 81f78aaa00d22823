// src/engine/orchestrator.rs

//! One supervised agent run, from prompt channel to [`Outcome`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PreparedConfig;
use crate::engine::finalize::{MetricsConverter, finalize};
use crate::engine::{Outcome, RunPaths};
use crate::exec::{
    DeadlineController, Escalation, OutputCapture, PromptFeeder, RelayState, Verdict, spawn_agent,
    spawn_reformatter,
};

/// Everything [`run_agent`] needs, assembled by the caller.
pub struct RunPlan {
    pub prepared: PreparedConfig,
    pub agent_bin: String,
    /// Orchestrator-controlled variables; they override `prepared.env_overlay`.
    pub fixed_env: BTreeMap<String, String>,
    pub grace: Duration,
    pub paths: RunPaths,
    pub converter: Box<dyn MetricsConverter>,
}

impl fmt::Debug for RunPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunPlan")
            .field("prepared", &self.prepared)
            .field("agent_bin", &self.agent_bin)
            .field("fixed_env_keys", &self.fixed_env.keys().collect::<Vec<_>>())
            .field("grace", &self.grace)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// Run the agent once and return its outcome.
///
/// Never fails: spawn errors, stream errors and timeouts all resolve into
/// the returned [`Outcome`]. The prompt channel is removed on every path.
/// Pretty-printed output goes to `console`.
pub async fn run_agent<W>(plan: &RunPlan, console: W) -> Outcome
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    log_run_start(plan).await;

    let capture = OutputCapture::default();
    let (verdict, escalation) = supervise(plan, console, &capture).await;

    info!(verdict = ?verdict, exit_code = verdict.exit_code(), "agent run settled");
    if capture.is_empty() {
        debug!("agent produced no stdout");
    }

    let outcome = finalize(
        &verdict,
        capture.to_string_lossy(),
        &plan.paths,
        plan.converter.as_ref(),
    )
    .await;

    escalation.finish().await;
    outcome
}

async fn log_run_start(plan: &RunPlan) {
    let prompt = &plan.prepared.prompt_path;
    match tokio::fs::metadata(prompt).await {
        Ok(meta) => info!(bytes = meta.len(), "prompt file size"),
        Err(_) => info!("prompt file size: unknown"),
    }

    if !plan.prepared.env_overlay.is_empty() {
        let keys: Vec<&str> = plan.prepared.env_overlay.keys().map(String::as_str).collect();
        info!(keys = %keys.join(", "), "custom environment variables");
    }

    info!(prompt = ?prompt, "running agent with prompt from file");
}

/// Feed, spawn, relay and race. Cleans up the channel before returning.
async fn supervise<W>(
    plan: &RunPlan,
    console: W,
    capture: &OutputCapture,
) -> (Verdict, Escalation)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut feeder = match PromptFeeder::start(&plan.paths.fifo, &plan.prepared.prompt_path) {
        Ok(feeder) => feeder,
        Err(e) => {
            error!(error = %e, "failed to set up prompt channel");
            return (errored(e), Escalation::none());
        }
    };

    let mut process = match spawn_agent(&plan.agent_bin, &plan.prepared, &plan.fixed_env) {
        Ok(process) => process,
        Err(e) => {
            error!(error = %e, "error spawning agent process");
            feeder.shutdown();
            return (errored(e), Escalation::none());
        }
    };

    info!(pid = process.pid(), "agent process running");

    let race = DeadlineController::new(plan.prepared.timeout, plan.grace)
        .arm(process.state(), process.terminator());

    if let Some(stdin) = process.take_stdin() {
        feeder.attach(stdin);
    }

    let reformatter = process
        .take_stdout()
        .map(|stdout| spawn_reformatter(stdout, console, capture.clone()));

    let resolved = race.resolve().await;

    if let Some(handle) = reformatter {
        match resolved.verdict {
            Verdict::TimedOut => handle.abort(),
            _ => drain(handle, plan.grace).await,
        }
    }

    log_relay_states(&mut feeder);
    feeder.shutdown();

    (resolved.verdict, resolved.escalation)
}

/// Record where each relay stood when cleanup began.
fn log_relay_states(feeder: &mut PromptFeeder) {
    let mut relays = vec![feeder.write_relay().state_snapshot()];
    relays.extend(feeder.read_relay().map(|r| r.state_snapshot()));

    for (name, state) in relays {
        match &state {
            RelayState::Errored(reason) => {
                warn!(relay = name, reason = %reason, "relay ended with an error")
            }
            RelayState::Closed => debug!(relay = name, "relay closed"),
            other => debug!(relay = name, state = ?other, "relay still open at cleanup"),
        }
    }
}

/// Let the reformatter read the rest of stdout, bounded by `limit`.
///
/// A grandchild holding stdout open must not stall the run forever.
async fn drain(mut handle: JoinHandle<()>, limit: Duration) {
    if tokio::time::timeout(limit, &mut handle).await.is_err() {
        warn!("agent stdout still open after exit; abandoning it");
        handle.abort();
    }
}

fn errored(e: impl fmt::Display) -> Verdict {
    Verdict::Errored {
        message: e.to_string(),
    }
}
