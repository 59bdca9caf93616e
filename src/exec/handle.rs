// src/exec/handle.rs

//! Process handle abstraction.
//!
//! A managed operation never touches `tokio::process::Child` directly. It
//! consumes an [`OperationHandle`]: a process id plus a channel of
//! [`HandleEvent`]s carrying output chunks and exactly one terminal event.
//!
//! [`OperationHandle::spawn`] is the production implementation: it spawns the
//! command and runs a background pump that owns the child. Tests build
//! handles from a plain channel with [`OperationHandle::new`] and drive the
//! events by hand.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::OperationError;
use crate::types::ExitInfo;

/// Capacity of the per-process event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Something a process reported.
///
/// `Stdout` / `Stderr` may arrive any number of times; at most one of
/// `Closed` / `Errored` arrives, after all output.
#[derive(Debug)]
pub enum HandleEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Closed(ExitInfo),
    Errored(OperationError),
}

/// Reference to a spawned (or failed-to-spawn) process.
#[derive(Debug)]
pub struct OperationHandle {
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    events: mpsc::Receiver<HandleEvent>,
}

impl OperationHandle {
    /// Wrap an arbitrary event source.
    pub fn new(pid: Option<u32>, events: mpsc::Receiver<HandleEvent>) -> Self {
        Self {
            pid,
            stdin: None,
            events,
        }
    }

    /// Spawn `command` and pump its output into a new handle.
    ///
    /// stdout and stderr are always piped; stdin is left as configured by
    /// the caller. A spawn failure is not returned as `Err`: the handle has no
    /// pid and yields a single `Errored(OperationError::Spawn)` event.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(mut command: Command) -> Self {
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        match command.spawn() {
            Ok(mut child) => {
                let pid = child.id();
                let stdin = child.stdin.take();
                debug!(?pid, "process spawned");
                tokio::spawn(pump(child, tx));
                Self {
                    pid,
                    stdin,
                    events: rx,
                }
            }
            Err(err) => {
                warn!(error = %err, "process failed to spawn");
                // Fresh channel with spare capacity; this cannot fail.
                let _ = tx.try_send(HandleEvent::Errored(OperationError::Spawn(err)));
                Self::new(None, rx)
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the child's stdin, if it was piped.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    pub(crate) fn into_events(self) -> mpsc::Receiver<HandleEvent> {
        self.events
    }
}

/// Own the child until it is reaped, forwarding output then the exit.
///
/// `Closed` is only sent once both output streams hit EOF, so no output
/// event can ever follow the terminal one.
async fn pump(mut child: Child, tx: mpsc::Sender<HandleEvent>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, (), ()) = tokio::join!(
        child.wait(),
        forward(stdout, tx.clone(), HandleEvent::Stdout),
        forward(stderr, tx.clone(), HandleEvent::Stderr),
    );

    let event = match status {
        Ok(status) => HandleEvent::Closed(ExitInfo::from_status(status)),
        Err(err) => HandleEvent::Errored(OperationError::Process(err)),
    };

    if tx.send(event).await.is_err() {
        debug!("process finished after its operation settled");
    }
}

/// Read a stream to EOF in chunks.
///
/// Keeps draining even once nobody listens, so the child never blocks on a
/// full pipe.
async fn forward<R>(reader: Option<R>, tx: mpsc::Sender<HandleEvent>, wrap: fn(Vec<u8>) -> HandleEvent)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut listening = true;
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if listening && tx.send(wrap(buf[..n].to_vec())).await.is_err() {
                    listening = false;
                }
            }
            Err(err) => {
                debug!(error = %err, "output stream read failed");
                break;
            }
        }
    }
}
