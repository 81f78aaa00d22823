// src/engine/finalize.rs

//! Turning a verdict and captured output into an [`Outcome`].
//!
//! The captured stdout is a sequence of JSON values (one per line). It is
//! written to a buffer file, converted into a single JSON array and saved
//! as the metrics artifact. Conversion is best-effort: it never flips a
//! successful run into a failure.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::engine::{Outcome, RunPaths};
use crate::errors::{AgentpipeError, Result};
use crate::exec::Verdict;
use crate::types::ConverterKind;

/// Converts a buffer of line-delimited JSON into a JSON array document.
///
/// Production picks an implementation with [`converter_for`]; tests can
/// provide their own.
pub trait MetricsConverter: Send + Sync {
    fn convert<'a>(
        &'a self,
        buffer: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// In-process conversion with `serde_json`.
#[derive(Debug, Clone, Default)]
pub struct SlurpConverter;

impl MetricsConverter for SlurpConverter {
    fn convert<'a>(
        &'a self,
        buffer: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(buffer).await?;
            let values = slurp_json(&text)?;
            let mut doc = serde_json::to_string_pretty(&values)?;
            doc.push('\n');
            Ok(doc)
        })
    }
}

/// Conversion through `jq -s .`.
#[derive(Debug, Clone)]
pub struct JqConverter {
    program: String,
}

impl JqConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for JqConverter {
    fn default() -> Self {
        Self::new("jq")
    }
}

impl MetricsConverter for JqConverter {
    fn convert<'a>(
        &'a self,
        buffer: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let output = Command::new(&self.program)
                .arg("-s")
                .arg(".")
                .arg(buffer)
                .output()
                .await
                .map_err(|source| AgentpipeError::SpawnError {
                    program: self.program.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(AgentpipeError::PostProcessError(format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }

            String::from_utf8(output.stdout)
                .map_err(|e| AgentpipeError::PostProcessError(format!("jq output is not UTF-8: {e}")))
        })
    }
}

pub fn converter_for(kind: ConverterKind) -> Box<dyn MetricsConverter> {
    match kind {
        ConverterKind::Native => Box::new(SlurpConverter),
        ConverterKind::Jq => Box::new(JqConverter::default()),
    }
}

/// Parse every whitespace-separated JSON value in `text`.
pub fn slurp_json(text: &str) -> Result<Vec<Value>> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AgentpipeError::PostProcessError(format!("output is not a JSON stream: {e}")))
}

/// Build the run's [`Outcome`] and persist metrics where possible.
pub async fn finalize(
    verdict: &Verdict,
    raw_output: String,
    paths: &RunPaths,
    converter: &dyn MetricsConverter,
) -> Outcome {
    let exit_code = verdict.exit_code();

    // The metrics name is fixed; never let an earlier run's file stand in.
    match tokio::fs::remove_file(&paths.metrics).await {
        Ok(()) => debug!(path = ?paths.metrics, "removed stale metrics file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?paths.metrics, error = %e, "could not remove stale metrics file"),
    }

    if exit_code == 0 {
        match persist_metrics(&raw_output, paths, converter).await {
            Ok(()) => info!(path = ?paths.metrics, "log saved"),
            Err(e) => warn!(error = %e, "failed to process output for execution metrics"),
        }
        return Outcome::Success {
            raw_output,
            metrics_path: paths.metrics.clone(),
        };
    }

    let raw_output = (!raw_output.is_empty()).then_some(raw_output);
    let mut metrics_path = None;
    if let Some(output) = &raw_output {
        match persist_metrics(output, paths, converter).await {
            Ok(()) => metrics_path = Some(paths.metrics.clone()),
            Err(e) => debug!(error = %e, "could not save metrics for failed run"),
        }
    }

    match verdict {
        Verdict::TimedOut => Outcome::TimedOut {
            raw_output,
            metrics_path,
        },
        _ => Outcome::Failure {
            exit_code,
            raw_output,
            metrics_path,
        },
    }
}

async fn persist_metrics(
    raw_output: &str,
    paths: &RunPaths,
    converter: &dyn MetricsConverter,
) -> Result<()> {
    tokio::fs::write(&paths.buffer, raw_output).await?;

    let converted = converter.convert(&paths.buffer).await;

    if let Err(e) = tokio::fs::remove_file(&paths.buffer).await {
        debug!(path = ?paths.buffer, error = %e, "ignoring buffer removal error");
    }

    tokio::fs::write(&paths.metrics, converted?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn slurps_line_delimited_values() {
        let values = slurp_json("{\"a\":1}\n{\"b\":2}\n\n[3]\n").unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0]["a"], 1);
    }

    #[test]
    fn rejects_non_json_lines() {
        let err = slurp_json("{\"a\":1}\nnot json\n").unwrap_err();
        assert!(matches!(err, AgentpipeError::PostProcessError(_)));
    }

    #[test]
    fn empty_output_slurps_to_empty_array() {
        assert!(slurp_json("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_writes_metrics_array() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());
        let raw = "{\"type\":\"system\"}\n{\"type\":\"result\"}\n".to_string();

        let outcome = finalize(&Verdict::Exited { code: 0 }, raw.clone(), &paths, &SlurpConverter).await;

        assert_eq!(
            outcome,
            Outcome::Success {
                raw_output: raw,
                metrics_path: paths.metrics.clone()
            }
        );
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&paths.metrics).unwrap()).unwrap();
        assert_eq!(doc.as_array().map(Vec::len), Some(2));
        assert!(!paths.buffer.exists());
    }

    #[tokio::test]
    async fn conversion_failure_keeps_success() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());

        let outcome = finalize(
            &Verdict::Exited { code: 0 },
            "plain text\n".to_string(),
            &paths,
            &SlurpConverter,
        )
        .await;

        assert!(outcome.is_success());
        assert!(!paths.metrics.exists());
    }

    #[tokio::test]
    async fn stale_metrics_from_earlier_run_are_removed() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());
        std::fs::write(&paths.metrics, "[{\"type\":\"old\"}]").unwrap();

        let outcome = finalize(
            &Verdict::Exited { code: 0 },
            "not json\n".to_string(),
            &paths,
            &SlurpConverter,
        )
        .await;

        assert!(outcome.is_success());
        assert!(!paths.metrics.exists());
    }

    #[tokio::test]
    async fn failure_with_output_saves_metrics() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());

        let outcome = finalize(
            &Verdict::Exited { code: 2 },
            "{\"type\":\"error\"}\n".to_string(),
            &paths,
            &SlurpConverter,
        )
        .await;

        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.metrics_path(), Some(paths.metrics.as_path()));
        assert!(paths.metrics.exists());
    }

    #[tokio::test]
    async fn failure_without_output_skips_metrics() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());

        let outcome = finalize(
            &Verdict::Errored {
                message: "spawn failed".into(),
            },
            String::new(),
            &paths,
            &SlurpConverter,
        )
        .await;

        assert_eq!(
            outcome,
            Outcome::Failure {
                exit_code: 1,
                raw_output: None,
                metrics_path: None
            }
        );
        assert!(!paths.metrics.exists());
    }

    #[tokio::test]
    async fn timeout_outcome_keeps_partial_output() {
        let dir = TempDir::new().unwrap();
        let paths = RunPaths::in_dir(dir.path());

        let outcome = finalize(
            &Verdict::TimedOut,
            "{\"type\":\"assistant\"}\n{\"trunc".to_string(),
            &paths,
            &SlurpConverter,
        )
        .await;

        match outcome {
            Outcome::TimedOut {
                raw_output,
                metrics_path,
            } => {
                assert!(raw_output.unwrap().starts_with("{\"type\""));
                // Truncated JSON cannot be converted; failure path stays silent.
                assert!(metrics_path.is_none());
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn jq_converter_matches_native_when_available() {
        if std::process::Command::new("jq").arg("--version").output().is_err() {
            eprintln!("jq not installed; skipping");
            return;
        }

        let dir = TempDir::new().unwrap();
        let buffer = dir.path().join("buf.txt");
        std::fs::write(&buffer, "{\"a\":1}\n{\"b\":[2]}\n").unwrap();

        let via_jq: Value = serde_json::from_str(&JqConverter::default().convert(&buffer).await.unwrap()).unwrap();
        let native: Value = serde_json::from_str(&SlurpConverter.convert(&buffer).await.unwrap()).unwrap();
        assert_eq!(via_jq, native);
    }

    #[tokio::test]
    async fn missing_jq_binary_is_an_error() {
        let dir = TempDir::new().unwrap();
        let buffer = dir.path().join("buf.txt");
        std::fs::write(&buffer, "{}\n").unwrap();

        let err = JqConverter::new("/no/such/jq").convert(&buffer).await.unwrap_err();
        assert!(matches!(err, AgentpipeError::SpawnError { .. }));
    }
}
