// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`handle`] abstracts a spawned process as a pid plus an event stream,
//!   and owns the real `tokio::process::Child` in a background pump.
//! - [`latch`] is the atomic "completed" latch deciding which trigger ends an
//!   operation.
//! - [`operation`] is the managed operation state machine: timeout, close,
//!   error and stop racing for a single cleanup.
//! - [`decode`] turns output chunks into text in a configurable encoding.
//! - [`capture`] runs a command to completion and collects a
//!   [`CaptureResult`](crate::types::CaptureResult).

pub mod capture;
pub mod decode;
pub mod handle;
pub mod latch;
pub mod operation;

pub use capture::{CaptureDefaults, CaptureInvoker, CaptureOptions, CaptureTask, STOPPED_MESSAGE};
pub use decode::{StreamDecoder, TextEncoding};
pub use handle::{HandleEvent, OperationHandle};
pub use latch::OperationLatch;
pub use operation::{ErrorDetails, ManagedOperation, OperationCallbacks, RegisterOptions, StopHandle};
