//! Shared helpers for runwarden's integration tests.
//!
//! - [`FakeProcess`]: an `OperationHandle` whose events are scripted by the
//!   test instead of a real child.
//! - [`RecordingKill`], [`RecordingPowerSignal`], [`CompletionProbe`]: seams
//!   that remember what the managed operation did to them.

pub mod fake_process;
pub mod recorders;

pub use fake_process::FakeProcess;
pub use recorders::{Completion, CompletionProbe, RecordingKill, RecordingPowerSignal};

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness's capture.
///
/// Output shows up for failing tests (or with `--nocapture`). `RUST_LOG`
/// overrides the default `info` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Await `fut`, failing the test if it takes longer than five seconds.
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test future did not finish within 5s")
}

/// Yield a handful of times so spawned supervisors get to run.
pub async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
