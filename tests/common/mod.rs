#![allow(dead_code)]

use std::sync::Arc;

use runwarden::exec::CaptureInvoker;
use runwarden::kill::{KillStrategy, platform_default};
use runwarden::power::PowerSignal;
use runwarden::registry::OperationRegistry;

/// Fresh registry feeding `power`, shared by a capture invoker using the
/// platform kill strategy.
pub fn invoker_with_power(power: Arc<dyn PowerSignal>) -> (Arc<OperationRegistry>, CaptureInvoker) {
    let registry = Arc::new(OperationRegistry::new(power));
    let invoker = CaptureInvoker::new(Arc::clone(&registry), platform_default());
    (registry, invoker)
}

pub fn invoker() -> (Arc<OperationRegistry>, CaptureInvoker) {
    let registry = Arc::new(OperationRegistry::default());
    let invoker = CaptureInvoker::new(Arc::clone(&registry), platform_default());
    (registry, invoker)
}

pub fn as_kill<K: KillStrategy + 'static>(kill: &K) -> Arc<dyn KillStrategy>
where
    K: Clone,
{
    Arc::new(kill.clone())
}

/// `sh -c <script>` argument vector.
pub fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}
