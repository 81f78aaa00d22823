// src/exec/feeder.rs

//! Prompt delivery through a named pipe.
//!
//! The prompt travels `prompt file → write relay → FIFO → read relay →
//! agent stdin`. Each relay is its own Tokio task with an observable
//! [`RelayState`], so either side can be torn down independently of the
//! agent process. Relay failures are logged and close the relay's output,
//! which the consumer sees as end-of-input.

use std::io;
use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::errors::{AgentpipeError, Result};

/// State machine of a single relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Starting,
    Streaming,
    Closed,
    Errored(String),
}

impl RelayState {
    pub fn is_finished(&self) -> bool {
        matches!(self, RelayState::Closed | RelayState::Errored(_))
    }
}

/// A background byte pump with a published state.
#[derive(Debug)]
pub struct Relay {
    name: &'static str,
    state: watch::Receiver<RelayState>,
    handle: JoinHandle<()>,
}

impl Relay {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> RelayState {
        self.state.borrow().clone()
    }

    /// Name and current state together, for logging.
    pub fn state_snapshot(&self) -> (&'static str, RelayState) {
        (self.name, self.state())
    }

    /// Wait until the relay reaches `Closed` or `Errored`.
    pub async fn finished(&mut self) -> RelayState {
        if let Ok(state) = self.state.wait_for(RelayState::is_finished).await {
            return state.clone();
        }
        // Sender gone: the task ended or was aborted.
        self.state.borrow().clone()
    }

    fn abort(&self) {
        if !self.handle.is_finished() {
            debug!(relay = self.name, "aborting relay");
            self.handle.abort();
        }
    }
}

/// Owns the FIFO path and removes it on drop.
#[derive(Debug)]
struct ChannelGuard {
    path: PathBuf,
    removed: bool,
}

impl ChannelGuard {
    fn create(path: &Path) -> Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = ?path, "removed stale channel"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AgentpipeError::ChannelError {
                    path: path.to_path_buf(),
                    reason: format!("removing stale file: {e}"),
                });
            }
        }

        mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|errno| {
            AgentpipeError::ChannelError {
                path: path.to_path_buf(),
                reason: format!("mkfifo: {errno}"),
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = ?self.path, error = %e, "ignoring channel removal error");
        }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Delivers a prompt file to the agent through a fresh FIFO.
#[derive(Debug)]
pub struct PromptFeeder {
    channel: ChannelGuard,
    receiver: Option<pipe::Receiver>,
    write_relay: Relay,
    read_relay: Option<Relay>,
}

impl PromptFeeder {
    /// Create the FIFO at `fifo` and start streaming `prompt` into it.
    ///
    /// Both FIFO ends are opened here, read end first and non-blocking, so
    /// neither open can stall the caller. Must be called inside a Tokio
    /// runtime.
    pub fn start(fifo: &Path, prompt: &Path) -> Result<Self> {
        let channel = ChannelGuard::create(fifo)?;

        let receiver = pipe::OpenOptions::new()
            .open_receiver(fifo)
            .map_err(|e| AgentpipeError::ChannelError {
                path: fifo.to_path_buf(),
                reason: format!("opening read end: {e}"),
            })?;
        let sender = pipe::OpenOptions::new()
            .open_sender(fifo)
            .map_err(|e| AgentpipeError::ChannelError {
                path: fifo.to_path_buf(),
                reason: format!("opening write end: {e}"),
            })?;

        let write_relay = spawn_write_relay(prompt.to_path_buf(), sender);

        Ok(Self {
            channel,
            receiver: Some(receiver),
            write_relay,
            read_relay: None,
        })
    }

    /// Start forwarding the FIFO into the agent's stdin.
    pub fn attach(&mut self, stdin: ChildStdin) {
        match self.receiver.take() {
            Some(receiver) => {
                self.read_relay = Some(Relay::spawn("prompt-read", receiver, stdin));
            }
            None => warn!("prompt feeder already attached; ignoring extra stdin"),
        }
    }

    pub fn write_relay(&mut self) -> &mut Relay {
        &mut self.write_relay
    }

    pub fn read_relay(&mut self) -> Option<&mut Relay> {
        self.read_relay.as_mut()
    }

    /// Stop both relays and remove the FIFO. Every step is best-effort.
    pub fn shutdown(mut self) {
        self.write_relay.abort();
        if let Some(relay) = &self.read_relay {
            relay.abort();
        }
        self.receiver.take();
        self.channel.remove();
        debug!(path = ?self.channel.path, "prompt channel cleaned up");
    }
}

fn spawn_write_relay(prompt: PathBuf, sender: pipe::Sender) -> Relay {
    let (state_tx, state_rx) = watch::channel(RelayState::Starting);
    let name = "prompt-write";

    let handle = tokio::spawn(async move {
        match tokio::fs::File::open(&prompt).await {
            Ok(file) => pump(name, file, sender, &state_tx).await,
            Err(e) => {
                error!(relay = name, path = ?prompt, error = %e, "error reading prompt file");
                // Dropping the sender closes the channel for the reader.
                drop(sender);
                state_tx.send_replace(RelayState::Errored(e.to_string()));
            }
        }
    });

    Relay {
        name,
        state: state_rx,
        handle,
    }
}

impl Relay {
    fn spawn<R, W>(name: &'static str, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(RelayState::Starting);
        let handle = tokio::spawn(async move {
            pump(name, reader, writer, &state_tx).await;
        });

        Self {
            name,
            state: state_rx,
            handle,
        }
    }
}

/// Copy `reader` into `writer` until EOF, then close `writer`.
async fn pump<R, W>(name: &'static str, mut reader: R, mut writer: W, state: &watch::Sender<RelayState>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    state.send_replace(RelayState::Streaming);

    let result = tokio::io::copy(&mut reader, &mut writer).await;
    let _ = writer.shutdown().await;
    drop(writer);

    match result {
        Ok(bytes) => {
            debug!(relay = name, bytes, "relay finished");
            state.send_replace(RelayState::Closed);
        }
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            warn!(relay = name, "consumer closed its end before the prompt was fully delivered");
            state.send_replace(RelayState::Errored(e.to_string()));
        }
        Err(e) => {
            error!(relay = name, error = %e, "relay failed; closing its output");
            state.send_replace(RelayState::Errored(e.to_string()));
        }
    }
}
