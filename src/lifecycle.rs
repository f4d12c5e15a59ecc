//! Liveness flag shared between a handle and the tasks it spawned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct Inner {
    live: AtomicBool,
    /// Held while a side effect runs, and by `revoke`
    gate: Mutex<()>,
}

/// Cleared exactly once, on teardown. Tasks check it after every await so a
/// result that lands after teardown is dropped instead of applied.
///
/// Side effects visible to the UI (step callbacks, alerts, published counts)
/// go through `run_if_live`. `revoke` waits for one that is already running,
/// so once it returns no further side effect can start on any thread. The
/// closure passed to `run_if_live` must not call `revoke` on the same flag.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<Inner>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            live: AtomicBool::new(true),
            gate: Mutex::new(()),
        }))
    }

    pub fn is_live(&self) -> bool {
        self.0.live.load(Ordering::Acquire)
    }

    /// Returns true if this call performed the teardown.
    pub fn revoke(&self) -> bool {
        let _gate = self.0.gate.lock().unwrap_or_else(|e| e.into_inner());
        self.0.live.swap(false, Ordering::AcqRel)
    }

    /// Run `f` only if still live, with teardown held off until it returns.
    pub fn run_if_live<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.0.gate.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_live() {
            return None;
        }
        Some(f())
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
