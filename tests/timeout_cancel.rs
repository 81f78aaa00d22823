// tests/timeout_cancel.rs

mod common;
use crate::common::{
    RunPlanBuilder, assert_no_prompt_channel, init_tracing, with_timeout, write_agent_script,
    write_prompt,
};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use agentpipe::config::PreparedConfig;
use agentpipe::engine::{Outcome, run_agent};
use agentpipe::exec::{DeadlineController, ProcessState, TIMEOUT_EXIT_CODE, Verdict, spawn_agent};

fn shell(script: &str) -> PreparedConfig {
    PreparedConfig {
        argv: vec!["-c".to_string(), script.to_string()],
        prompt_path: PathBuf::from("/dev/null"),
        env_overlay: BTreeMap::new(),
        timeout: Duration::from_millis(300),
    }
}

#[tokio::test]
async fn slow_agent_times_out_with_124() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let prompt = write_prompt(dir.path(), b"hi");
    let agent = write_agent_script(dir.path(), "echo '{\"type\":\"system\"}'\nexec sleep 30");

    let plan = RunPlanBuilder::new(dir.path(), &agent, &prompt)
        .timeout(Duration::from_millis(300))
        .grace(Duration::from_secs(1))
        .build();

    let started = Instant::now();
    let outcome = with_timeout(run_agent(&plan, tokio::io::sink())).await;

    assert!(matches!(outcome, Outcome::TimedOut { .. }), "got {outcome:?}");
    assert_eq!(outcome.exit_code(), TIMEOUT_EXIT_CODE);

    // Output emitted before the deadline survives the timeout.
    assert_eq!(outcome.raw_output(), Some("{\"type\":\"system\"}\n"));
    let metrics = outcome.metrics_path().expect("partial output is persisted");
    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(metrics).unwrap()).unwrap();
    assert_eq!(doc.as_array().map(Vec::len), Some(1));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_no_prompt_channel(dir.path());
}

#[tokio::test]
async fn sigterm_ends_a_cooperative_process() {
    init_tracing();
    let process = spawn_agent("sh", &shell("exec sleep 30"), &BTreeMap::new()).unwrap();

    let resolved = DeadlineController::new(Duration::from_millis(200), Duration::from_secs(5))
        .arm(process.state(), process.terminator())
        .resolve()
        .await;
    assert_eq!(resolved.verdict, Verdict::TimedOut);

    with_timeout(resolved.escalation.finish()).await;
    assert_eq!(with_timeout(process.wait()).await, ProcessState::Signaled(15));
}

#[tokio::test]
async fn sigkill_follows_when_sigterm_is_ignored() {
    init_tracing();
    let process = spawn_agent(
        "sh",
        &shell("trap '' TERM; exec sleep 30"),
        &BTreeMap::new(),
    )
    .unwrap();

    let grace = Duration::from_millis(500);
    let resolved = DeadlineController::new(Duration::from_millis(300), grace)
        .arm(process.state(), process.terminator())
        .resolve()
        .await;
    assert_eq!(resolved.verdict, Verdict::TimedOut);

    let escalation_started = Instant::now();
    with_timeout(resolved.escalation.finish()).await;
    assert!(escalation_started.elapsed() >= grace);

    assert_eq!(with_timeout(process.wait()).await, ProcessState::Signaled(9));
}

#[tokio::test]
async fn exit_before_deadline_wins_the_race() {
    init_tracing();
    let process = spawn_agent("sh", &shell("exit 5"), &BTreeMap::new()).unwrap();

    let resolved = DeadlineController::new(Duration::from_secs(30), Duration::from_secs(5))
        .arm(process.state(), process.terminator())
        .resolve()
        .await;

    assert_eq!(resolved.verdict, Verdict::Exited { code: 5 });
    // No escalation is pending, so this returns immediately.
    with_timeout(resolved.escalation.finish()).await;
}

#[tokio::test]
async fn killed_by_signal_maps_to_shell_convention() {
    init_tracing();
    let process = spawn_agent("sh", &shell("kill -9 $$"), &BTreeMap::new()).unwrap();

    let resolved = DeadlineController::new(Duration::from_secs(30), Duration::from_secs(5))
        .arm(process.state(), process.terminator())
        .resolve()
        .await;

    assert_eq!(resolved.verdict.exit_code(), 128 + 9);
}
