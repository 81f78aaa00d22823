// src/exec/deadline.rs

//! Deadline enforcement for the agent process.
//!
//! Two sources race to settle a run: the process exiting (or its waiter
//! failing) and the deadline timer. Both write into a [`VerdictCell`];
//! the first write wins and later writes are ignored.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::exec::supervisor::{ProcessState, Terminator};

/// Exit code reported when the deadline fires (same as coreutils `timeout`).
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code for runs that failed without an exit status of their own.
pub const GENERIC_FAILURE_EXIT_CODE: i32 = 1;

/// Time between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// How the race between exit and deadline was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Exited { code: i32 },
    Errored { message: String },
    TimedOut,
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Exited { code } => *code,
            Verdict::Errored { .. } => GENERIC_FAILURE_EXIT_CODE,
            Verdict::TimedOut => TIMEOUT_EXIT_CODE,
        }
    }

    fn from_state(state: &ProcessState) -> Option<Self> {
        match state {
            ProcessState::Running => None,
            ProcessState::Exited(code) => Some(Verdict::Exited { code: *code }),
            ProcessState::Signaled(sig) => Some(Verdict::Exited { code: 128 + sig }),
            ProcessState::Failed(message) => Some(Verdict::Errored {
                message: message.clone(),
            }),
        }
    }
}

/// Single-assignment slot for the run's verdict.
#[derive(Debug)]
pub struct VerdictCell {
    slot: Mutex<Option<oneshot::Sender<Verdict>>>,
}

impl VerdictCell {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<Verdict>) {
        let (tx, rx) = oneshot::channel();
        let cell = Arc::new(Self {
            slot: Mutex::new(Some(tx)),
        });
        (cell, rx)
    }

    /// Try to settle the verdict. Returns `true` only for the first caller.
    pub fn resolve(&self, verdict: Verdict) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                let _ = tx.send(verdict);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Arms the race for one supervised process.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineController {
    timeout: Duration,
    grace: Duration,
}

impl DeadlineController {
    pub fn new(timeout: Duration, grace: Duration) -> Self {
        Self { timeout, grace }
    }

    /// Start the exit watcher and the deadline timer.
    ///
    /// Call this right after the process is spawned; the deadline counts
    /// from here.
    pub fn arm(&self, state: watch::Receiver<ProcessState>, terminator: Terminator) -> Race {
        let (cell, verdict_rx) = VerdictCell::new();

        let exit_source = tokio::spawn(watch_exit(state.clone(), Arc::clone(&cell)));
        let deadline_source = tokio::spawn(watch_deadline(
            self.timeout,
            self.grace,
            state,
            terminator,
            cell,
        ));

        Race {
            verdict_rx,
            exit_source,
            deadline_source,
        }
    }
}

/// A running race; [`Race::resolve`] waits for the winner.
#[derive(Debug)]
pub struct Race {
    verdict_rx: oneshot::Receiver<Verdict>,
    exit_source: JoinHandle<()>,
    deadline_source: JoinHandle<()>,
}

impl Race {
    /// Wait for the first verdict and cancel the losing source.
    ///
    /// On timeout the deadline task keeps running to escalate to SIGKILL;
    /// it is handed back as an [`Escalation`].
    pub async fn resolve(self) -> Resolved {
        let verdict = match self.verdict_rx.await {
            Ok(v) => v,
            Err(_) => Verdict::Errored {
                message: "verdict sources ended without resolving".to_string(),
            },
        };

        self.exit_source.abort();

        let escalation = if verdict == Verdict::TimedOut {
            Escalation(Some(self.deadline_source))
        } else {
            self.deadline_source.abort();
            Escalation(None)
        };

        Resolved {
            verdict,
            escalation,
        }
    }
}

#[derive(Debug)]
pub struct Resolved {
    pub verdict: Verdict,
    pub escalation: Escalation,
}

/// Pending SIGTERM → SIGKILL escalation after a timeout.
#[derive(Debug, Default)]
pub struct Escalation(Option<JoinHandle<()>>);

impl Escalation {
    pub fn none() -> Self {
        Self(None)
    }

    /// Wait until the process is gone or SIGKILL has been sent.
    pub async fn finish(self) {
        if let Some(handle) = self.0 {
            let _ = handle.await;
        }
    }
}

async fn watch_exit(mut state: watch::Receiver<ProcessState>, cell: Arc<VerdictCell>) {
    let verdict = match state.wait_for(ProcessState::is_terminal).await {
        Ok(current) => Verdict::from_state(&current),
        Err(_) => Some(Verdict::Errored {
            message: "agent process watcher went away".to_string(),
        }),
    };

    if let Some(verdict) = verdict {
        if !cell.resolve(verdict) {
            debug!("process finished after the verdict was already settled");
        }
    }
}

async fn watch_deadline(
    timeout: Duration,
    grace: Duration,
    mut state: watch::Receiver<ProcessState>,
    terminator: Terminator,
    cell: Arc<VerdictCell>,
) {
    sleep(timeout).await;

    if !cell.resolve(Verdict::TimedOut) {
        return;
    }

    error!(
        timeout_secs = timeout.as_secs_f64(),
        "agent process timed out; sending SIGTERM"
    );
    if let Err(e) = terminator.graceful() {
        debug!(error = %e, "SIGTERM not delivered; process likely gone");
    }

    let exited = tokio::time::timeout(grace, async {
        let _ = state.wait_for(ProcessState::is_terminal).await;
    })
    .await;

    match exited {
        Ok(()) => info!("agent process exited after SIGTERM"),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs_f64(),
                "agent process still running after grace period; sending SIGKILL"
            );
            if let Err(e) = terminator.force() {
                debug!(error = %e, "SIGKILL not delivered; process likely gone");
            }
        }
    }
}
