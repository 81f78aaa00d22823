// src/config/env_block.rs

//! Parser for the free-form custom environment block.
//!
//! Each line is either blank, a `#` comment, or a `KEY: VALUE` pair.
//! Anything else is dropped; parsing never fails.

use std::collections::BTreeMap;

/// Parse a `KEY: VALUE` block into a mapping.
///
/// - Lines are trimmed; blank lines and `#` comments are skipped.
/// - The line is split at the first `:`; lines without one are skipped.
/// - Key and value are trimmed; an empty key drops the line.
/// - Later duplicates overwrite earlier ones.
pub fn parse_custom_env(block: Option<&str>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    let Some(block) = block else {
        return env;
    };

    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        env.insert(key.to_string(), value.trim().to_string());
    }

    env
}
