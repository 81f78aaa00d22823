// src/engine/report.rs

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::Outcome;
use crate::errors::Result;
use crate::types::Conclusion;

/// Machine-readable summary of a run for the surrounding pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub conclusion: Conclusion,
    pub exit_code: i32,
    pub execution_file: Option<PathBuf>,
}

impl From<&Outcome> for RunReport {
    fn from(outcome: &Outcome) -> Self {
        Self {
            conclusion: outcome.conclusion(),
            exit_code: outcome.exit_code(),
            execution_file: outcome.metrics_path().map(Path::to_path_buf),
        }
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
