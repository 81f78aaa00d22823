// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs the agent with `tokio::process::Command` and owns
//! every concurrent moving part of a run:
//!
//! - [`supervisor`] spawns the agent and publishes its `ProcessState`.
//! - [`feeder`] creates the named pipe and relays the prompt into stdin.
//! - [`reformat`] relays stdout to the console and captures raw bytes.
//! - [`deadline`] races process exit against the timeout and escalates
//!   SIGTERM to SIGKILL.

pub mod deadline;
pub mod feeder;
pub mod reformat;
pub mod supervisor;

pub use deadline::{
    DEFAULT_GRACE, DeadlineController, Escalation, GENERIC_FAILURE_EXIT_CODE, Race, Resolved,
    TIMEOUT_EXIT_CODE, Verdict, VerdictCell,
};
pub use feeder::{PromptFeeder, Relay, RelayState};
pub use reformat::{LineReformatter, OutputCapture, relay_stdout, spawn_reformatter};
pub use supervisor::{
    ProcessState, SupervisedProcess, Terminator, compose_env, orchestrator_env, spawn_agent,
};
