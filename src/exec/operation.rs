// src/exec/operation.rs

//! Managed operation: one spawned process and the state machine deciding
//! how it ends.
//!
//! Four triggers can end an operation:
//!
//! - **timeout**: the optional deadline elapses,
//! - **close**: the process exits on its own,
//! - **error**: the process fails to spawn or the OS reports an error,
//! - **stop**: the caller invokes [`StopHandle::stop`].
//!
//! They may fire concurrently. An [`OperationLatch`] decides the single
//! winner; only the winner runs the cleanup body:
//!
//! 1. cancel the deadline (the supervisor task exits or is aborted),
//! 2. deregister from the [`OperationRegistry`], which
//! 3. updates the power signal on an empty/non-empty transition,
//! 4. on timeout, kill the process before notifying,
//! 5. on stop, kill the process synchronously inside `stop()`,
//! 6. invoke exactly one completion callback.
//!
//! Output callbacks run on the supervisor task in arrival order and never
//! after the latch has been set.

use std::cell::Cell;
use std::fmt;
use std::future::pending;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::OperationError;
use crate::exec::handle::{EVENT_CHANNEL_CAPACITY, HandleEvent, OperationHandle};
use crate::exec::latch::OperationLatch;
use crate::kill::KillStrategy;
use crate::registry::{OperationRecord, OperationRegistry};
use crate::types::{ExitInfo, OperationKind, TerminalState};

pub type DataCallback = Box<dyn FnMut(&[u8]) + Send>;
pub type ExitCallback = Box<dyn FnOnce(ExitInfo) + Send>;
pub type ErrorCallback = Box<dyn FnOnce(OperationError, ErrorDetails) + Send>;
pub type StopCallback = Box<dyn FnOnce() + Send>;

/// Extra context handed to `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorDetails {
    /// `true` only when the operation hit its deadline.
    pub timed_out: bool,
}

/// Caller hooks for a managed operation. All optional.
#[derive(Default)]
pub struct OperationCallbacks {
    on_stdout: Option<DataCallback>,
    on_stderr: Option<DataCallback>,
    on_exit: Option<ExitCallback>,
    on_error: Option<ErrorCallback>,
    on_stopped: Option<StopCallback>,
}

impl OperationCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stdout(mut self, f: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(f));
        self
    }

    pub fn on_stderr(mut self, f: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(f));
        self
    }

    /// Natural exit.
    pub fn on_exit(mut self, f: impl FnOnce(ExitInfo) + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(f));
        self
    }

    /// Spawn/runtime error, or timeout (with `timed_out = true`).
    pub fn on_error(mut self, f: impl FnOnce(OperationError, ErrorDetails) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Caller-initiated stop.
    pub fn on_stopped(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_stopped = Some(Box::new(f));
        self
    }

    fn split(self) -> (Completion, OutputSinks) {
        (
            Completion {
                on_exit: self.on_exit,
                on_error: self.on_error,
                on_stopped: self.on_stopped,
            },
            OutputSinks {
                on_stdout: self.on_stdout,
                on_stderr: self.on_stderr,
            },
        )
    }
}

impl fmt::Debug for OperationCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCallbacks")
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_stopped", &self.on_stopped.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Completion {
    on_exit: Option<ExitCallback>,
    on_error: Option<ErrorCallback>,
    on_stopped: Option<StopCallback>,
}

struct OutputSinks {
    on_stdout: Option<DataCallback>,
    on_stderr: Option<DataCallback>,
}

/// Everything needed to put a process under management.
#[derive(Debug)]
pub struct RegisterOptions {
    id: String,
    kind: OperationKind,
    handle: Option<OperationHandle>,
    timeout: Option<Duration>,
    callbacks: OperationCallbacks,
}

impl RegisterOptions {
    pub fn new(id: impl Into<String>, handle: impl Into<Option<OperationHandle>>) -> Self {
        Self {
            id: id.into(),
            kind: OperationKind::default(),
            handle: handle.into(),
            timeout: None,
            callbacks: OperationCallbacks::default(),
        }
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Deadline for the operation. `None` or a zero duration arms no timer.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn callbacks(mut self, callbacks: OperationCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// Entry point for putting a process under management.
pub struct ManagedOperation;

impl ManagedOperation {
    /// Register an operation and start supervising it.
    ///
    /// Never fails. Misuse (empty id, missing handle, an id that is already
    /// live, no Tokio runtime) is logged and yields a no-op [`StopHandle`];
    /// a handle that cannot be managed is terminated rather than leaked.
    pub fn register(
        registry: &Arc<OperationRegistry>,
        kill: &Arc<dyn KillStrategy>,
        options: RegisterOptions,
    ) -> StopHandle {
        let RegisterOptions {
            id,
            kind,
            handle,
            timeout,
            callbacks,
        } = options;

        let Some(handle) = handle else {
            warn!(id = %id, "registration without a process handle; returning no-op stop");
            return StopHandle::noop();
        };

        if id.is_empty() {
            warn!(pid = ?handle.pid(), "registration without an id; terminating unmanaged process");
            kill.terminate(handle.pid());
            return StopHandle::noop();
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(id = %id, error = %err, "registration outside a Tokio runtime; terminating unmanaged process");
                kill.terminate(handle.pid());
                return StopHandle::noop();
            }
        };

        let (completion, sinks) = callbacks.split();
        let shared = Arc::new(OperationShared {
            id,
            kind,
            pid: handle.pid(),
            latch: OperationLatch::new(),
            registry: Arc::clone(registry),
            kill: Arc::clone(kill),
            supervisor: Mutex::new(None),
            completion: Mutex::new(Some(completion)),
            delivery: Mutex::new(()),
        });

        if !registry.register(OperationRecord::for_operation(&shared)) {
            kill.terminate(shared.pid);
            return StopHandle::noop();
        }

        debug!(id = %shared.id, kind = %kind, pid = ?shared.pid, ?timeout, "supervising operation");
        let task = runtime.spawn(supervise(
            Arc::clone(&shared),
            handle.into_events(),
            timeout,
            sinks,
        ));
        shared.attach_supervisor(task.abort_handle());

        StopHandle {
            shared: Some(shared),
        }
    }
}

/// State shared between the supervisor task, stop handles and the registry.
pub(crate) struct OperationShared {
    id: String,
    kind: OperationKind,
    pid: Option<u32>,
    latch: OperationLatch,
    registry: Arc<OperationRegistry>,
    kill: Arc<dyn KillStrategy>,
    supervisor: Mutex<Option<AbortHandle>>,
    completion: Mutex<Option<Completion>>,
    /// Held across the settled check and the output callback, and by
    /// `stop()` while it settles.
    delivery: Mutex<()>,
}

impl OperationShared {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn kind(&self) -> OperationKind {
        self.kind
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Stop trigger. Returns `false` if the operation had already settled.
    ///
    /// Waits for an output callback running on another thread to return, so
    /// no output is delivered after `on_stopped`. Called from inside one of
    /// this operation's own output callbacks, it settles without waiting.
    pub(crate) fn stop(&self) -> bool {
        let settled = {
            let _delivery = (!self.delivering_here()).then(|| lock(&self.delivery));
            self.settle(TerminalState::Stopped)
        };
        let Some(completion) = settled else {
            return false;
        };

        info!(id = %self.id, pid = ?self.pid, "stopping operation");
        self.kill.terminate(self.pid);

        if let Some(on_stopped) = completion.on_stopped {
            on_stopped();
        }
        true
    }

    /// Run an output callback unless the operation has already settled.
    fn deliver(&self, sink: &mut Option<DataCallback>, chunk: &[u8]) -> Flow {
        let _delivery = lock(&self.delivery);
        if self.latch.is_settled() {
            return Flow::Done;
        }
        if let Some(callback) = sink.as_mut() {
            let _scope = DeliveryScope::enter(self);
            callback(chunk);
        }
        Flow::Continue
    }

    fn delivering_here(&self) -> bool {
        DELIVERING.get() == self.address()
    }

    fn address(&self) -> usize {
        self as *const Self as usize
    }

    fn finish_closed(&self, exit: ExitInfo) {
        let Some(completion) = self.settle(TerminalState::Closed) else {
            return;
        };

        info!(id = %self.id, code = ?exit.code, signal = ?exit.signal, "operation exited");
        if let Some(on_exit) = completion.on_exit {
            on_exit(exit);
        }
    }

    fn finish_errored(&self, err: OperationError) {
        let Some(completion) = self.settle(TerminalState::Errored) else {
            return;
        };

        warn!(id = %self.id, error = %err, "operation failed");
        if let Some(on_error) = completion.on_error {
            on_error(err, ErrorDetails { timed_out: false });
        }
    }

    fn finish_timed_out(&self, after: Duration) {
        let Some(completion) = self.settle(TerminalState::TimedOut) else {
            return;
        };

        warn!(id = %self.id, pid = ?self.pid, timeout_ms = after.as_millis() as u64, "operation timed out; killing");
        self.kill.terminate(self.pid);

        if let Some(on_error) = completion.on_error {
            on_error(OperationError::TimedOut(after), ErrorDetails { timed_out: true });
        }
    }

    /// Run the shared part of the cleanup body if `outcome` wins the latch.
    ///
    /// Returns the completion callbacks for the winner only.
    fn settle(&self, outcome: TerminalState) -> Option<Completion> {
        if !self.latch.try_settle(outcome) {
            debug!(
                id = %self.id,
                attempted = %outcome,
                settled = ?self.latch.state(),
                "operation already settled; ignoring trigger"
            );
            return None;
        }

        let supervisor = lock(&self.supervisor).take();
        if outcome == TerminalState::Stopped {
            if let Some(supervisor) = supervisor {
                supervisor.abort();
            }
        }

        self.registry.deregister(&self.id);
        debug!(id = %self.id, state = %outcome, "operation settled");

        Some(lock(&self.completion).take().unwrap_or_default())
    }

    fn attach_supervisor(&self, handle: AbortHandle) {
        let mut slot = lock(&self.supervisor);
        if self.latch.is_settled() {
            // Stopped before the supervisor was attached.
            handle.abort();
        } else {
            *slot = Some(handle);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multiplex the deadline and the handle's events until one trigger wins.
///
/// The deadline is polled first so a process flooding its output cannot
/// starve its own timeout.
async fn supervise(
    shared: Arc<OperationShared>,
    mut events: mpsc::Receiver<HandleEvent>,
    timeout: Option<Duration>,
    mut sinks: OutputSinks,
) {
    let deadline = async move {
        match timeout {
            Some(after) => {
                sleep(after).await;
                after
            }
            None => pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            after = &mut deadline => {
                // An exit already queued means the child is reaped; killing
                // now could hit a recycled pid or group.
                if !drain_queued(&shared, &mut events, &mut sinks) {
                    shared.finish_timed_out(after);
                }
                return;
            }

            event = events.recv() => {
                let event = event.unwrap_or_else(|| {
                    HandleEvent::Errored(OperationError::Process(io::Error::other(
                        "process handle closed without an exit status",
                    )))
                });
                if apply(&shared, event, &mut sinks) == Flow::Done {
                    return;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

fn apply(shared: &OperationShared, event: HandleEvent, sinks: &mut OutputSinks) -> Flow {
    match event {
        HandleEvent::Stdout(chunk) => shared.deliver(&mut sinks.on_stdout, &chunk),
        HandleEvent::Stderr(chunk) => shared.deliver(&mut sinks.on_stderr, &chunk),
        HandleEvent::Closed(exit) => {
            shared.finish_closed(exit);
            Flow::Done
        }
        HandleEvent::Errored(err) => {
            shared.finish_errored(err);
            Flow::Done
        }
    }
}

/// Apply events that were already queued when the deadline fired.
///
/// Returns `true` if one of them ended the operation. Bounded by the channel
/// capacity so a flooding process cannot keep the timeout waiting.
fn drain_queued(
    shared: &OperationShared,
    events: &mut mpsc::Receiver<HandleEvent>,
    sinks: &mut OutputSinks,
) -> bool {
    for _ in 0..EVENT_CHANNEL_CAPACITY {
        match events.try_recv() {
            Ok(event) => {
                if apply(shared, event, sinks) == Flow::Done {
                    return shared.latch.is_settled();
                }
            }
            Err(_) => return false,
        }
    }
    false
}

thread_local! {
    /// Address of the operation whose output callback runs on this thread.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as delivering output for one operation.
struct DeliveryScope {
    previous: usize,
}

impl DeliveryScope {
    fn enter(shared: &OperationShared) -> Self {
        Self {
            previous: DELIVERING.replace(shared.address()),
        }
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERING.set(self.previous);
    }
}

/// Caller's handle on a managed operation.
///
/// Cheap to clone. A no-op handle (returned on registration misuse) accepts
/// every call and does nothing.
#[derive(Clone, Default)]
pub struct StopHandle {
    shared: Option<Arc<OperationShared>>,
}

impl StopHandle {
    pub fn noop() -> Self {
        Self::default()
    }

    /// Request termination.
    ///
    /// Synchronous: when this returns, the kill has been issued and the
    /// registry/power bookkeeping is updated, but the OS process may still be
    /// exiting. Calling it again, or after the operation ended, does nothing.
    pub fn stop(&self) {
        if let Some(shared) = &self.shared {
            shared.stop();
        }
    }

    pub fn is_noop(&self) -> bool {
        self.shared.is_none()
    }

    pub fn id(&self) -> Option<&str> {
        self.shared.as_deref().map(OperationShared::id)
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.as_deref().and_then(OperationShared::pid)
    }

    /// How the operation ended, or `None` while it is still running (and
    /// always for a no-op handle).
    pub fn state(&self) -> Option<TerminalState> {
        self.shared.as_deref().and_then(|s| s.latch.state())
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("id", &self.id())
            .field("pid", &self.pid())
            .field("state", &self.state())
            .finish()
    }
}
