// src/exec/latch.rs

//! The "completed" latch guarding a managed operation.
//!
//! Holds `Running` until the first trigger settles it; the winning
//! [`TerminalState`] is then fixed for good. The check-and-set is a single
//! atomic compare-exchange, so triggers racing on different worker threads
//! still produce exactly one winner.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::TerminalState;

const RUNNING: u8 = 0;

#[derive(Debug, Default)]
pub struct OperationLatch {
    state: AtomicU8,
}

impl OperationLatch {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Attempt to move from `Running` to `outcome`.
    ///
    /// Returns `true` for the single caller that wins.
    pub fn try_settle(&self, outcome: TerminalState) -> bool {
        self.state
            .compare_exchange(RUNNING, encode(outcome), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// The terminal state, or `None` while still running.
    pub fn state(&self) -> Option<TerminalState> {
        decode(self.state.load(Ordering::Acquire))
    }

    pub fn is_settled(&self) -> bool {
        self.state.load(Ordering::Acquire) != RUNNING
    }
}

fn encode(state: TerminalState) -> u8 {
    match state {
        TerminalState::TimedOut => 1,
        TerminalState::Closed => 2,
        TerminalState::Errored => 3,
        TerminalState::Stopped => 4,
    }
}

fn decode(raw: u8) -> Option<TerminalState> {
    match raw {
        1 => Some(TerminalState::TimedOut),
        2 => Some(TerminalState::Closed),
        3 => Some(TerminalState::Errored),
        4 => Some(TerminalState::Stopped),
        _ => None,
    }
}
