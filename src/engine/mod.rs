// src/engine/mod.rs

//! Orchestration engine for agentpipe.
//!
//! This module ties together one agent run:
//! - prompt feeding, process supervision and output relay (from `exec`)
//! - deadline enforcement
//! - finalization into a single [`Outcome`]
//! - reporting of that outcome
//!
//! The wiring lives in [`orchestrator`]; metrics persistence in
//! [`finalize`]; the pipeline-facing report in [`report`].

use std::path::{Path, PathBuf};

use crate::exec::TIMEOUT_EXIT_CODE;
use crate::types::Conclusion;

pub mod finalize;
pub mod orchestrator;
pub mod report;

pub use finalize::{JqConverter, MetricsConverter, SlurpConverter, converter_for, finalize};
pub use orchestrator::{RunPlan, run_agent};
pub use report::{RunReport, write_report};

/// File name of the metrics artifact inside the work directory.
pub const METRICS_FILE_NAME: &str = "claude-execution-output.json";

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        raw_output: String,
        metrics_path: PathBuf,
    },
    Failure {
        exit_code: i32,
        raw_output: Option<String>,
        metrics_path: Option<PathBuf>,
    },
    TimedOut {
        raw_output: Option<String>,
        metrics_path: Option<PathBuf>,
    },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success { .. } => 0,
            Outcome::Failure { exit_code, .. } => *exit_code,
            Outcome::TimedOut { .. } => TIMEOUT_EXIT_CODE,
        }
    }

    pub fn conclusion(&self) -> Conclusion {
        match self {
            Outcome::Success { .. } => Conclusion::Success,
            _ => Conclusion::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.conclusion() == Conclusion::Success
    }

    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Outcome::Success { raw_output, .. } => Some(raw_output.as_str()),
            Outcome::Failure { raw_output, .. } | Outcome::TimedOut { raw_output, .. } => {
                raw_output.as_deref()
            }
        }
    }

    pub fn metrics_path(&self) -> Option<&Path> {
        match self {
            Outcome::Success { metrics_path, .. } => Some(metrics_path.as_path()),
            Outcome::Failure { metrics_path, .. } | Outcome::TimedOut { metrics_path, .. } => {
                metrics_path.as_deref()
            }
        }
    }
}

/// Files touched by one run.
///
/// The channel and buffer names carry the orchestrator's pid so two runs
/// sharing a work directory do not trample each other's pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub work_dir: PathBuf,
    pub fifo: PathBuf,
    pub buffer: PathBuf,
    pub metrics: PathBuf,
    pub inline_prompt: PathBuf,
}

impl RunPaths {
    pub fn in_dir(work_dir: impl AsRef<Path>) -> Self {
        let dir = work_dir.as_ref();
        let pid = std::process::id();
        Self {
            work_dir: dir.to_path_buf(),
            fifo: dir.join(format!("claude_prompt_pipe.{pid}")),
            buffer: dir.join(format!("claude-output.{pid}.txt")),
            metrics: dir.join(METRICS_FILE_NAME),
            inline_prompt: dir.join(format!("claude-prompt.{pid}.txt")),
        }
    }

    /// `RUNNER_TEMP` if set, otherwise the OS temp directory.
    pub fn default_dir() -> PathBuf {
        std::env::var_os("RUNNER_TEMP")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_in_work_dir() {
        let paths = RunPaths::in_dir("/work");
        assert_eq!(paths.metrics, Path::new("/work/claude-execution-output.json"));
        assert!(paths.fifo.starts_with("/work"));
        assert!(paths.buffer.starts_with("/work"));
        assert_ne!(paths.fifo, paths.buffer);
        assert!(
            paths
                .fifo
                .to_string_lossy()
                .ends_with(&std::process::id().to_string())
        );
    }

    #[test]
    fn outcome_accessors() {
        let ok = Outcome::Success {
            raw_output: "x".into(),
            metrics_path: PathBuf::from("/m.json"),
        };
        assert_eq!(ok.exit_code(), 0);
        assert!(ok.is_success());
        assert_eq!(ok.metrics_path(), Some(Path::new("/m.json")));

        let timed_out = Outcome::TimedOut {
            raw_output: None,
            metrics_path: None,
        };
        assert_eq!(timed_out.exit_code(), 124);
        assert_eq!(timed_out.conclusion(), Conclusion::Failure);
        assert_eq!(timed_out.raw_output(), None);

        let failed = Outcome::Failure {
            exit_code: 2,
            raw_output: Some("partial".into()),
            metrics_path: None,
        };
        assert_eq!(failed.exit_code(), 2);
        assert_eq!(failed.raw_output(), Some("partial"));
    }
}
