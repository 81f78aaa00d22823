use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the captured agent output is turned into the metrics artifact.
///
/// - `Native`: slurp the JSON values with `serde_json` (default).
/// - `Jq`: shell out to `jq -s .`, which must be on `PATH`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    #[default]
    Native,
    Jq,
}

impl FromStr for ConverterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(ConverterKind::Native),
            "jq" => Ok(ConverterKind::Jq),
            other => Err(format!(
                "invalid converter: {other} (expected \"native\" or \"jq\")"
            )),
        }
    }
}

/// Overall verdict reported to the surrounding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Conclusion {
    Success,
    Failure,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conclusion::Success => f.write_str("success"),
            Conclusion::Failure => f.write_str("failure"),
        }
    }
}
