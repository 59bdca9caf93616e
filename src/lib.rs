// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod kill;
pub mod logging;
pub mod power;
pub mod registry;
pub mod types;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_or_default};
use crate::errors::RunwardenError;
use crate::exec::{CaptureInvoker, CaptureOptions, TextEncoding};
use crate::power::TracingPowerSignal;
use crate::registry::OperationRegistry;
use crate::types::CaptureResult;

/// Exit code reported when the command hit its deadline.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// High-level entry point used by `main.rs`.
///
/// Wires config, registry, kill strategy and capture invoker together, runs
/// the requested command, forwards its output and returns the exit code the
/// binary should use. Ctrl-C stops every live operation.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = match &args.config {
        Some(path) => load_or_default(path, true)?,
        None => load_or_default(default_config_path(), false)?,
    };

    let (program, program_args) = args
        .command
        .split_first()
        .context("no command given")?;
    let options = capture_options(&args, &cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &args, &options);
        return Ok(0);
    }

    let registry = Arc::new(OperationRegistry::new(Arc::new(TracingPowerSignal)));
    let invoker = CaptureInvoker::new(Arc::clone(&registry), cfg.kill_strategy())
        .with_defaults(cfg.capture_defaults());

    // Ctrl-C → stop every live operation.
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let stopped = registry.stop_all();
            info!(stopped, "Ctrl+C received; stopped live operations");
        });
    }

    let result = invoker.run(program, program_args, options).await;
    report(&result)?;

    debug!(exit_code = ?result.exit_code, timed_out = result.timed_out, "command finished");
    Ok(exit_code_for(&result))
}

/// Merge CLI flags over the config file into per-invocation options.
pub fn capture_options(args: &CliArgs, cfg: &ConfigFile) -> Result<CaptureOptions> {
    let mut options = CaptureOptions::new().kind(args.kind);

    if let Some(ms) = args.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }

    if let Some(label) = &args.encoding {
        let encoding = TextEncoding::for_label(label).ok_or_else(|| {
            RunwardenError::ConfigError(format!("--encoding '{label}' is not a known encoding label"))
        })?;
        options = options.encoding(encoding);
    } else {
        options = options.encoding(cfg.encoding());
    }

    if let Some(input) = &args.stdin {
        options = options.stdin(input.as_bytes());
    }

    if let Some(cwd) = &args.cwd {
        options = options.cwd(cwd);
    }

    if args.clear_env || !args.env.is_empty() {
        let mut env: HashMap<String, String> = if args.clear_env {
            HashMap::new()
        } else {
            std::env::vars().collect()
        };
        env.extend(args.env.iter().cloned());
        options = options.env(env);
    }

    Ok(options)
}

/// Map a capture result onto a process exit code.
///
/// The child's own code when it exited, 124 on timeout (as coreutils
/// `timeout` does), 1 for any other failure.
pub fn exit_code_for(result: &CaptureResult) -> i32 {
    if result.timed_out {
        TIMEOUT_EXIT_CODE
    } else if result.error.is_some() {
        1
    } else {
        result.exit_code.unwrap_or(1)
    }
}

fn report(result: &CaptureResult) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = std::io::stderr().lock();
    stderr.write_all(result.stderr.as_bytes())?;
    if let Some(error) = &result.error {
        writeln!(stderr, "runwarden: {error}")?;
    }
    stderr.flush()?;
    Ok(())
}

/// Simple dry-run output: resolved config and options.
fn print_dry_run(cfg: &ConfigFile, args: &CliArgs, options: &CaptureOptions) {
    println!("runwarden dry-run");
    println!("  kill.tree_kill = {:?}", cfg.kill.tree_kill);
    println!("  capture.timeout_ms = {:?}", cfg.capture.timeout_ms);
    println!("  capture.encoding = {}", cfg.capture.encoding);
    println!();
    println!("command: {:?}", args.command);
    println!("  kind: {}", options.kind);
    if let Some(timeout) = options.timeout {
        println!("  timeout: {}ms", timeout.as_millis());
    }
    if let Some(encoding) = options.encoding {
        println!("  encoding: {}", encoding.name());
    }
    if let Some(cwd) = &options.cwd {
        println!("  cwd: {}", cwd.display());
    }
    if let Some(env) = &options.env {
        println!("  env: {} variables", env.len());
    }
    if let Some(stdin) = &options.stdin {
        println!("  stdin: {} bytes", stdin.len());
    }

    debug!("dry-run complete (no execution)");
}
