use std::io;

use anyhow::Result;
use tokio::sync::mpsc;

use runwarden::errors::OperationError;
use runwarden::exec::{HandleEvent, OperationHandle};
use runwarden::types::ExitInfo;

/// A scripted process.
///
/// `FakeProcess::new` returns an `OperationHandle` to register plus the
/// controller used to emit output and terminal events on demand, so tests
/// can line up triggers in any order they like.
pub struct FakeProcess {
    tx: mpsc::Sender<HandleEvent>,
}

impl FakeProcess {
    pub fn new(pid: Option<u32>) -> (OperationHandle, FakeProcess) {
        let (tx, rx) = mpsc::channel(runwarden::exec::handle::EVENT_CHANNEL_CAPACITY);
        (OperationHandle::new(pid, rx), FakeProcess { tx })
    }

    pub async fn stdout(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(HandleEvent::Stdout(data.into())).await
    }

    pub async fn stderr(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send(HandleEvent::Stderr(data.into())).await
    }

    pub async fn exit(&self, code: i32) -> Result<()> {
        self.send(HandleEvent::Closed(ExitInfo {
            code: Some(code),
            signal: None,
        }))
        .await
    }

    pub async fn fail(&self, message: &str) -> Result<()> {
        self.send(HandleEvent::Errored(OperationError::Process(io::Error::other(
            message.to_string(),
        ))))
        .await
    }

    pub async fn fail_to_spawn(&self) -> Result<()> {
        self.send(HandleEvent::Errored(OperationError::Spawn(io::Error::new(
            io::ErrorKind::NotFound,
            "no such file or directory",
        ))))
        .await
    }

    /// Whether the operation side has stopped listening.
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, event: HandleEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("operation no longer listening"))
    }
}
