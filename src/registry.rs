// src/registry.rs

//! Registry of live operations.
//!
//! Pure storage: two mutation points (`register` / `deregister`) and a few
//! read-only queries. All timing and arbitration lives in
//! [`crate::exec::operation`]. Each managed operation only ever touches its
//! own id, so the single mutex here is never contended for long.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, warn};

use crate::exec::operation::OperationShared;
use crate::power::{NoopPowerSignal, PowerSignal};
use crate::types::OperationKind;

/// Entry for one live operation.
///
/// The registry does not own the operation: it keeps a weak reference that
/// is only used by [`OperationRegistry::stop_all`].
#[derive(Clone)]
pub struct OperationRecord {
    pub id: String,
    pub kind: OperationKind,
    pub pid: Option<u32>,
    operation: Weak<OperationShared>,
}

impl OperationRecord {
    /// A record with no operation attached (useful for bookkeeping-only
    /// callers and tests).
    pub fn new(id: impl Into<String>, kind: OperationKind, pid: Option<u32>) -> Self {
        Self {
            id: id.into(),
            kind,
            pid,
            operation: Weak::new(),
        }
    }

    pub(crate) fn for_operation(shared: &Arc<OperationShared>) -> Self {
        Self {
            id: shared.id().to_string(),
            kind: shared.kind(),
            pid: shared.pid(),
            operation: Arc::downgrade(shared),
        }
    }
}

impl fmt::Debug for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Mapping from operation id to its record, plus the power signal fed by
/// empty/non-empty transitions.
pub struct OperationRegistry {
    records: Mutex<HashMap<String, OperationRecord>>,
    power: Arc<dyn PowerSignal>,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("live", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoopPowerSignal))
    }
}

impl OperationRegistry {
    pub fn new(power: Arc<dyn PowerSignal>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            power,
        }
    }

    /// Store a record.
    ///
    /// Returns `false` (and logs) instead of failing when the id is empty or
    /// already belongs to a live operation.
    pub fn register(&self, record: OperationRecord) -> bool {
        if record.id.is_empty() {
            warn!(kind = %record.kind, "refusing to register operation without an id");
            return false;
        }

        let mut records = self.lock();
        if records.contains_key(&record.id) {
            warn!(id = %record.id, "operation id already registered; ignoring");
            return false;
        }

        debug!(id = %record.id, kind = %record.kind, pid = ?record.pid, "operation registered");
        records.insert(record.id.clone(), record);
        if records.len() == 1 {
            self.signal_power(true);
        }
        true
    }

    /// Remove a record. Removing an unknown id is a no-op.
    pub fn deregister(&self, id: &str) -> bool {
        let mut records = self.lock();
        if records.remove(id).is_none() {
            return false;
        }

        debug!(id, "operation deregistered");
        if records.is_empty() {
            self.signal_power(false);
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Copy of every live record, in no particular order.
    pub fn snapshot(&self) -> Vec<OperationRecord> {
        self.lock().values().cloned().collect()
    }

    /// Stop every live managed operation. Returns how many were stopped.
    ///
    /// The lock is released before stopping, since each stop deregisters.
    pub fn stop_all(&self) -> usize {
        let live: Vec<Arc<OperationShared>> = self
            .lock()
            .values()
            .filter_map(|record| record.operation.upgrade())
            .collect();

        let mut stopped = 0;
        for operation in live {
            if operation.stop() {
                stopped += 1;
            }
        }
        stopped
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OperationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs under the records lock so transitions are delivered in order.
    fn signal_power(&self, active: bool) {
        let power = &self.power;
        if panic::catch_unwind(AssertUnwindSafe(|| power.update(active))).is_err() {
            error!(active, "power signal panicked; continuing");
        }
    }
}
