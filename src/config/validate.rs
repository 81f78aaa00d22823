// src/config/validate.rs

use crate::config::model::{ConfigFile, ProviderSettings, PromptSection};
use crate::errors::{AgentpipeError, Result};

/// Check provider selection, credentials and prompt inputs.
///
/// All problems are collected and reported together so a pipeline author
/// can fix them in one go. `env` resolves pipeline-level variables such as
/// `AWS_ACCESS_KEY_ID`; production passes `std::env::var`.
pub fn validate_inputs<F>(cfg: &ConfigFile, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    validate_provider(&cfg.provider, &env, &mut errors);
    validate_prompt(&cfg.prompt, &mut errors);

    if errors.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
    Err(AgentpipeError::ConfigError(format!(
        "Task input validation failed:\n{}",
        listed.join("\n")
    )))
}

fn validate_provider<F>(provider: &ProviderSettings, env: &F, errors: &mut Vec<String>)
where
    F: Fn(&str) -> Option<String>,
{
    if provider.use_bedrock && provider.use_vertex {
        errors.push(
            "Cannot use both Bedrock and Vertex AI simultaneously. Please set only one provider."
                .to_string(),
        );
    }

    if !provider.use_bedrock && !provider.use_vertex {
        if !is_set(&provider.anthropic_api_key) && !is_set(&provider.claude_code_oauth_token) {
            errors.push(
                "Either 'anthropic_api_key' or 'claude_code_oauth_token' is required when using direct Anthropic API."
                    .to_string(),
            );
        }
    } else if provider.use_bedrock {
        if !is_set(&provider.aws_region) {
            errors.push("'aws_region' is required when using AWS Bedrock.".to_string());
        }
        if !env_set(env, "AWS_ACCESS_KEY_ID") || !env_set(env, "AWS_SECRET_ACCESS_KEY") {
            errors.push(
                "AWS credentials (AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY) must be set when using AWS Bedrock."
                    .to_string(),
            );
        }
    } else {
        if !is_set(&provider.gcp_project_id) {
            errors.push("'gcp_project_id' is required when using Google Vertex AI.".to_string());
        }
        if !is_set(&provider.gcp_region) {
            errors.push("'gcp_region' is required when using Google Vertex AI.".to_string());
        }
        if !env_set(env, "GOOGLE_APPLICATION_CREDENTIALS") {
            errors.push(
                "GOOGLE_APPLICATION_CREDENTIALS must be set when using Google Vertex AI."
                    .to_string(),
            );
        }
    }
}

fn validate_prompt(prompt: &PromptSection, errors: &mut Vec<String>) {
    let has_text = is_set(&prompt.text);
    let has_file = prompt
        .file
        .as_ref()
        .is_some_and(|p| !p.as_os_str().is_empty());

    match (has_text, has_file) {
        (false, false) => errors.push("Either 'prompt' or 'prompt_file' is required.".to_string()),
        (true, true) => errors.push(
            "Both 'prompt' and 'prompt_file' were provided. Please specify only one.".to_string(),
        ),
        _ => {}
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn env_set<F>(env: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    env(key).is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn with_api_key() -> ConfigFile {
        let mut cfg = ConfigFile::default();
        cfg.provider.anthropic_api_key = Some("sk-test".into());
        cfg.prompt.text = Some("hello".into());
        cfg
    }

    #[test]
    fn direct_api_with_key_and_prompt_is_valid() {
        validate_inputs(&with_api_key(), no_env).unwrap();
    }

    #[test]
    fn oauth_token_is_an_alternative_to_api_key() {
        let mut cfg = with_api_key();
        cfg.provider.anthropic_api_key = None;
        cfg.provider.claude_code_oauth_token = Some("oauth".into());
        validate_inputs(&cfg, no_env).unwrap();
    }

    #[test]
    fn missing_credentials_and_prompt_are_reported_together() {
        let cfg = ConfigFile::default();
        let err = validate_inputs(&cfg, no_env).unwrap_err().to_string();

        assert!(err.contains("Task input validation failed:"));
        assert!(err.contains("  - Either 'anthropic_api_key'"));
        assert!(err.contains("  - Either 'prompt' or 'prompt_file'"));
    }

    #[test]
    fn both_prompt_sources_are_rejected() {
        let mut cfg = with_api_key();
        cfg.prompt.file = Some(PathBuf::from("/tmp/p.md"));
        let err = validate_inputs(&cfg, no_env).unwrap_err().to_string();
        assert!(err.contains("Please specify only one"));
    }

    #[test]
    fn bedrock_and_vertex_are_exclusive() {
        let mut cfg = with_api_key();
        cfg.provider.use_bedrock = true;
        cfg.provider.use_vertex = true;
        let err = validate_inputs(&cfg, no_env).unwrap_err().to_string();
        assert!(err.contains("Cannot use both Bedrock and Vertex AI"));
    }

    #[test]
    fn bedrock_needs_region_and_aws_credentials() {
        let mut cfg = with_api_key();
        cfg.provider.use_bedrock = true;

        let err = validate_inputs(&cfg, no_env).unwrap_err().to_string();
        assert!(err.contains("'aws_region' is required"));
        assert!(err.contains("AWS credentials"));

        cfg.provider.aws_region = Some("eu-west-1".into());
        let env = |key: &str| match key {
            "AWS_ACCESS_KEY_ID" | "AWS_SECRET_ACCESS_KEY" => Some("x".to_string()),
            _ => None,
        };
        validate_inputs(&cfg, env).unwrap();
    }

    #[test]
    fn vertex_needs_project_region_and_credentials_file() {
        let mut cfg = with_api_key();
        cfg.provider.use_vertex = true;
        cfg.provider.gcp_project_id = Some("proj".into());

        let err = validate_inputs(&cfg, no_env).unwrap_err().to_string();
        assert!(!err.contains("gcp_project_id"));
        assert!(err.contains("'gcp_region' is required"));
        assert!(err.contains("GOOGLE_APPLICATION_CREDENTIALS"));
    }
}
