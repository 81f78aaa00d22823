// src/exec/reformat.rs

//! Relay of the agent's stdout to the console.
//!
//! Stream-JSON lines are pretty-printed, anything else passes through.
//! Chunks are buffered until a newline arrives, so a line split across
//! reads is classified as a whole. Every byte is also appended, untouched,
//! to an [`OutputCapture`] for the metrics artifact.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::errors::{AgentpipeError, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Raw stdout bytes, shared between the reformatter and the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputCapture {
    pub fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Incremental line splitter + renderer.
#[derive(Debug, Default)]
pub struct LineReformatter {
    pending: Vec<u8>,
}

impl LineReformatter {
    /// Feed a chunk; returns the display text for every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return out;
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        // `complete` ends with '\n'; drop it so split yields only real lines.
        for line in complete[..complete.len() - 1].split(|b| *b == b'\n') {
            render_line(line, true, &mut out);
        }
        out
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        let line = std::mem::take(&mut self.pending);
        if !line.is_empty() {
            render_line(&line, false, &mut out);
        }
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn render_line(line: &[u8], terminated: bool, out: &mut String) {
    let text: Cow<'_, str> = String::from_utf8_lossy(line);
    if text.trim().is_empty() {
        return;
    }

    match serde_json::from_str::<Value>(&text).and_then(|v| serde_json::to_string_pretty(&v)) {
        Ok(pretty) => out.push_str(&pretty),
        Err(_) => out.push_str(&text),
    }

    if terminated {
        out.push('\n');
    }
}

/// Pump `stdout` into `console` until EOF, reformatting along the way.
///
/// Console write failures stop the display but not the capture; a read
/// failure ends the relay with an error.
pub async fn relay_stdout<R, W>(
    mut stdout: R,
    console: &mut W,
    capture: &OutputCapture,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut formatter = LineReformatter::default();
    let mut display = true;
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = stdout
            .read(&mut buf)
            .await
            .map_err(|e| AgentpipeError::StreamError(format!("reading agent stdout: {e}")))?;
        if n == 0 {
            break;
        }

        capture.append(&buf[..n]);
        let rendered = formatter.push(&buf[..n]);
        if display && !rendered.is_empty() {
            display = write_console(console, &rendered).await;
        }
    }

    let tail = formatter.finish();
    if display && !tail.is_empty() {
        write_console(console, &tail).await;
    }

    debug!(bytes = capture.len(), "agent stdout closed");
    Ok(())
}

async fn write_console<W: AsyncWrite + Unpin>(console: &mut W, text: &str) -> bool {
    let result = async {
        console.write_all(text.as_bytes()).await?;
        console.flush().await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "console write failed; agent output is still captured");
            false
        }
    }
}

/// Spawn [`relay_stdout`] as a background task.
pub fn spawn_reformatter<R, W>(stdout: R, mut console: W, capture: OutputCapture) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = relay_stdout(stdout, &mut console, &capture).await {
            error!(error = %e, "error reading agent stdout");
        }
    })
}
