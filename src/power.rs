// src/power.rs

//! Power-management seam.
//!
//! The registry tells a [`PowerSignal`] whenever it transitions between
//! "no operations running" and "at least one operation running". What that
//! means for the OS (inhibiting sleep, showing a tray badge, nothing at all)
//! is decided by the host.

use tracing::info;

/// Receives registry empty/non-empty transitions.
///
/// Called with `true` on the 0 -> 1 transition and `false` on 1 -> 0. It is
/// invoked while the registry lock is held, so implementations must return
/// quickly and must not call back into the registry.
pub trait PowerSignal: Send + Sync {
    fn update(&self, active: bool);
}

impl<F> PowerSignal for F
where
    F: Fn(bool) + Send + Sync,
{
    fn update(&self, active: bool) {
        self(active)
    }
}

/// Ignores every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPowerSignal;

impl PowerSignal for NoopPowerSignal {
    fn update(&self, _active: bool) {}
}

/// Logs transitions; used by the binary where no OS integration is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPowerSignal;

impl PowerSignal for TracingPowerSignal {
    fn update(&self, active: bool) {
        if active {
            info!("operations active; power blocker requested");
        } else {
            info!("no operations active; power blocker released");
        }
    }
}
