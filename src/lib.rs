// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod settings;
pub mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, PreparedConfig, load_from_path, prepare_run_config, validate_inputs};
use crate::engine::{Outcome, RunPaths, RunPlan, RunReport, converter_for, run_agent, write_report};
use crate::exec::{compose_env, orchestrator_env};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading, CLI overrides and validation
/// - argv/environment preparation (before any side effect)
/// - agent settings and inline prompt setup
/// - the supervised run and its report
///
/// Returns the exit code the process should terminate with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_config(&args)?;
    validate_inputs(&cfg, |key| std::env::var(key).ok())?;

    let paths = RunPaths::in_dir(
        cfg.runtime
            .work_dir
            .clone()
            .unwrap_or_else(RunPaths::default_dir),
    );

    let inline_prompt = cfg.prompt.text.as_deref().filter(|t| !t.is_empty());
    let prompt_path = match (inline_prompt, &cfg.prompt.file) {
        (Some(_), _) => paths.inline_prompt.clone(),
        (None, Some(file)) => file.clone(),
        (None, None) => anyhow::bail!("no prompt provided"),
    };

    let prepared = prepare_run_config(&prompt_path, &cfg.options)?;

    if args.dry_run {
        print_dry_run(&cfg, &prepared, &paths);
        return Ok(0);
    }

    std::fs::create_dir_all(&paths.work_dir)
        .with_context(|| format!("creating work dir {:?}", paths.work_dir))?;

    if cfg.runtime.skip_settings {
        debug!("leaving agent settings untouched");
    } else {
        let config_dir = settings::agent_config_dir(
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        );
        match config_dir {
            Some(dir) => {
                settings::ensure_agent_settings(&dir)?;
            }
            None => warn!("neither XDG_CONFIG_HOME nor HOME is set; skipping agent settings"),
        }
    }

    if let Some(text) = inline_prompt {
        std::fs::write(&paths.inline_prompt, text)
            .with_context(|| format!("writing inline prompt {:?}", paths.inline_prompt))?;
    }

    let plan = RunPlan {
        prepared,
        agent_bin: cfg.runtime.agent_bin.clone(),
        fixed_env: orchestrator_env(&cfg.provider, std::env::var("AWS_REGION").ok()),
        grace: Duration::from_secs(cfg.runtime.grace_seconds),
        paths,
        converter: converter_for(cfg.runtime.converter),
    };

    let outcome = run_agent(&plan, tokio::io::stdout()).await;

    if inline_prompt.is_some() {
        if let Err(e) = std::fs::remove_file(&plan.paths.inline_prompt) {
            debug!(error = %e, "ignoring inline prompt removal error");
        }
    }

    log_outcome(&outcome);

    if let Some(report_path) = &args.report {
        write_report(report_path, &RunReport::from(&outcome))?;
        info!(path = ?report_path, "run report written");
    }

    Ok(outcome.exit_code())
}

/// Config file (if any) with CLI flags applied on top.
fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut cfg = match &args.config {
        Some(path) => load_from_path(path)?,
        None => ConfigFile::default(),
    };
    args.apply_to(&mut cfg);
    Ok(cfg)
}

fn log_outcome(outcome: &Outcome) {
    info!(
        conclusion = %outcome.conclusion(),
        exit_code = outcome.exit_code(),
        "agent run finished"
    );
    match outcome.metrics_path() {
        Some(path) => info!(execution_file = ?path, "execution metrics available"),
        None => debug!("no execution metrics for this run"),
    }
}

/// Simple dry-run output: print the agent command line and environment keys.
fn print_dry_run(cfg: &ConfigFile, prepared: &PreparedConfig, paths: &RunPaths) {
    println!("agentpipe dry-run");
    println!("  agent_bin = {}", cfg.runtime.agent_bin);
    println!("  prompt = {}", prepared.prompt_path.display());
    println!("  timeout = {}s", prepared.timeout.as_secs());
    println!("  grace = {}s", cfg.runtime.grace_seconds);
    println!("  work_dir = {}", paths.work_dir.display());
    println!();

    println!("argv ({}):", prepared.argv.len());
    for arg in &prepared.argv {
        println!("  {arg}");
    }

    let env = compose_env(&prepared.env_overlay, &orchestrator_env(&cfg.provider, None));
    println!("env ({}):", env.len());
    for key in env.keys() {
        println!("  {key}");
    }

    debug!("dry-run complete (no execution)");
}
