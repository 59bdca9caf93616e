// src/exec/capture.rs

//! Capture invoker: run a command to completion and collect its output.
//!
//! Built on [`ManagedOperation`]: each invocation spawns a process, registers
//! it under a fresh id, feeds optional stdin, decodes stdout and stderr into
//! separate buffers and resolves to a single [`CaptureResult`]. Failures are
//! reported inside the result, never as `Err`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ignore_and_log;
use crate::exec::decode::{StreamDecoder, TextEncoding};
use crate::exec::handle::OperationHandle;
use crate::exec::operation::{ManagedOperation, OperationCallbacks, RegisterOptions, StopHandle};
use crate::kill::KillStrategy;
use crate::registry::OperationRegistry;
use crate::types::{CaptureResult, OperationKind};

/// Message reported when a capture is ended through its stop handle.
pub const STOPPED_MESSAGE: &str = "operation stopped";

/// Invoker-wide fallbacks for options left unset per invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureDefaults {
    pub timeout: Option<Duration>,
    pub encoding: TextEncoding,
}

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Full environment for the child. `None` inherits ours.
    pub env: Option<HashMap<String, String>>,
    pub cwd: Option<PathBuf>,
    pub encoding: Option<TextEncoding>,
    pub timeout: Option<Duration>,
    /// Written to the child's stdin, which is then closed. When `None`, stdin
    /// is connected to the null device.
    pub stdin: Option<Vec<u8>>,
    pub kind: OperationKind,
}

impl CaptureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Runs commands under management and captures their output.
#[derive(Debug, Clone)]
pub struct CaptureInvoker {
    registry: Arc<OperationRegistry>,
    kill: Arc<dyn KillStrategy>,
    defaults: CaptureDefaults,
}

impl CaptureInvoker {
    pub fn new(registry: Arc<OperationRegistry>, kill: Arc<dyn KillStrategy>) -> Self {
        Self {
            registry,
            kill,
            defaults: CaptureDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: CaptureDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Run `program` with `args` and wait for its result.
    pub async fn run<I, S>(&self, program: impl AsRef<OsStr>, args: I, options: CaptureOptions) -> CaptureResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.start(program, args, options).wait().await
    }

    /// Start `program` and return immediately with a [`CaptureTask`] that can
    /// be stopped or awaited.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<I, S>(&self, program: impl AsRef<OsStr>, args: I, options: CaptureOptions) -> CaptureTask
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let id = next_capture_id();
        let encoding = options.encoding.unwrap_or(self.defaults.encoding);
        let timeout = options.timeout.or(self.defaults.timeout);

        let mut command = Command::new(program);
        command.args(args);
        if let Some(env) = &options.env {
            command.env_clear().envs(env);
        }
        if let Some(cwd) = &options.cwd {
            command.current_dir(cwd);
        }
        command.stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        #[cfg(unix)]
        if self.kill.isolates_process_group() {
            command.process_group(0);
        }

        let mut handle = OperationHandle::spawn(command);
        let pid = handle.pid();
        let child_stdin = handle.take_stdin();

        info!(
            id = %id,
            program = ?program,
            ?pid,
            encoding = encoding.name(),
            ?timeout,
            "starting capture"
        );

        let (result_tx, result_rx) = oneshot::channel();
        let sink = Arc::new(CaptureSink::new(encoding, result_tx));

        let stop = ManagedOperation::register(
            &self.registry,
            &self.kill,
            RegisterOptions::new(id.clone(), handle)
                .kind(options.kind)
                .timeout(timeout)
                .callbacks(sink_callbacks(&sink)),
        );

        if let (Some(child_stdin), Some(input)) = (child_stdin, options.stdin) {
            tokio::spawn(write_stdin(id.clone(), child_stdin, input));
        }

        CaptureTask {
            id,
            pid,
            stop,
            result: result_rx,
        }
    }
}

/// A capture in flight.
#[derive(Debug)]
pub struct CaptureTask {
    id: String,
    pid: Option<u32>,
    stop: StopHandle,
    result: oneshot::Receiver<CaptureResult>,
}

impl CaptureTask {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the process; the result resolves with [`STOPPED_MESSAGE`].
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub async fn wait(self) -> CaptureResult {
        self.result.await.unwrap_or_else(|_| CaptureResult {
            error: Some("operation ended without a result".to_string()),
            ..CaptureResult::default()
        })
    }
}

/// Unique per invocation; unguessability is not a goal.
fn next_capture_id() -> String {
    format!("capture-{}", Uuid::new_v4())
}

async fn write_stdin(id: String, mut stdin: ChildStdin, input: Vec<u8>) {
    debug!(id = %id, bytes = input.len(), "writing stdin");
    ignore_and_log("writing stdin", stdin.write_all(&input).await);
    ignore_and_log("closing stdin", stdin.shutdown().await);
}

/// Output buffers plus the one-shot result sender.
struct CaptureSink {
    state: Mutex<SinkState>,
}

struct SinkState {
    stdout: StreamDecoder,
    stderr: StreamDecoder,
    result_tx: Option<oneshot::Sender<CaptureResult>>,
}

impl CaptureSink {
    fn new(encoding: TextEncoding, result_tx: oneshot::Sender<CaptureResult>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                stdout: encoding.decoder(),
                stderr: encoding.decoder(),
                result_tx: Some(result_tx),
            }),
        }
    }

    fn push_stdout(&self, chunk: &[u8]) {
        self.state().stdout.push(chunk);
    }

    fn push_stderr(&self, chunk: &[u8]) {
        self.state().stderr.push(chunk);
    }

    fn resolve(&self, exit_code: Option<i32>, error: Option<String>, timed_out: bool) {
        let mut state = self.state();
        let Some(result_tx) = state.result_tx.take() else {
            return;
        };

        let result = CaptureResult {
            exit_code,
            stdout: state.stdout.finish(),
            stderr: state.stderr.finish(),
            error,
            timed_out,
        };

        if result_tx.send(result).is_err() {
            debug!("capture result dropped; nobody is waiting");
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sink_callbacks(sink: &Arc<CaptureSink>) -> OperationCallbacks {
    let stdout = Arc::clone(sink);
    let stderr = Arc::clone(sink);
    let exited = Arc::clone(sink);
    let errored = Arc::clone(sink);
    let stopped = Arc::clone(sink);

    OperationCallbacks::new()
        .on_stdout(move |chunk| stdout.push_stdout(chunk))
        .on_stderr(move |chunk| stderr.push_stderr(chunk))
        .on_exit(move |exit| exited.resolve(exit.code, None, false))
        .on_error(move |err, details| errored.resolve(None, Some(err.to_string()), details.timed_out))
        .on_stopped(move || stopped.resolve(None, Some(STOPPED_MESSAGE.to_string()), false))
}
