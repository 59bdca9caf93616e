use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use runwarden::exec::OperationCallbacks;
use runwarden::kill::KillStrategy;
use runwarden::power::PowerSignal;
use runwarden::types::ExitInfo;

/// Kill strategy that only records which pids it was asked to terminate.
#[derive(Debug, Clone, Default)]
pub struct RecordingKill {
    calls: Arc<Mutex<Vec<Option<u32>>>>,
}

impl RecordingKill {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Option<u32>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl KillStrategy for RecordingKill {
    fn terminate(&self, pid: Option<u32>) {
        self.calls.lock().unwrap().push(pid);
    }
}

/// Power signal that records every transition it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingPowerSignal {
    transitions: Arc<Mutex<Vec<bool>>>,
}

impl RecordingPowerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.lock().unwrap().clone()
    }
}

impl PowerSignal for RecordingPowerSignal {
    fn update(&self, active: bool) {
        self.transitions.lock().unwrap().push(active);
    }
}

/// One completion callback invocation, as seen by a [`CompletionProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Exit(ExitInfo),
    Error { message: String, timed_out: bool },
    Stopped,
}

/// Records output and completion callbacks of a managed operation.
#[derive(Debug, Clone, Default)]
pub struct CompletionProbe {
    completions: Arc<Mutex<Vec<Completion>>>,
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
    notify: Arc<Notify>,
}

impl CompletionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks feeding this probe.
    pub fn callbacks(&self) -> OperationCallbacks {
        let stdout = Arc::clone(&self.stdout);
        let stderr = Arc::clone(&self.stderr);
        let on_exit = self.clone();
        let on_error = self.clone();
        let on_stopped = self.clone();

        OperationCallbacks::new()
            .on_stdout(move |chunk| stdout.lock().unwrap().extend_from_slice(chunk))
            .on_stderr(move |chunk| stderr.lock().unwrap().extend_from_slice(chunk))
            .on_exit(move |exit| on_exit.record(Completion::Exit(exit)))
            .on_error(move |err, details| {
                on_error.record(Completion::Error {
                    message: err.to_string(),
                    timed_out: details.timed_out,
                })
            })
            .on_stopped(move || on_stopped.record(Completion::Stopped))
    }

    pub fn completions(&self) -> Vec<Completion> {
        self.completions.lock().unwrap().clone()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock().unwrap()).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.lock().unwrap()).into_owned()
    }

    /// Wait until at least one completion callback has fired.
    pub async fn wait_for_completion(&self) {
        loop {
            if !self.completions.lock().unwrap().is_empty() {
                return;
            }
            self.notify.notified().await;
        }
    }

    fn record(&self, completion: Completion) {
        self.completions.lock().unwrap().push(completion);
        self.notify.notify_one();
    }
}
