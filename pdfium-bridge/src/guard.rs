//! Process-wide engine lifecycle
//!
//! PDFium keeps global state that must be initialized before the first
//! document is opened and may only be torn down once no document is left
//! open. [`EngineGuard`] reference-counts open documents and serializes the
//! check-and-mutate sequence behind a single mutex.

use crate::engine::Engine;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct GuardState {
    initialized: bool,
    refcount: usize,
}

/// Snapshot of the guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    /// Whether the engine's global state is currently initialized.
    pub initialized: bool,
    /// Number of outstanding leases (open documents and in-flight opens).
    pub open_documents: usize,
}

/// Owns an engine together with its init/teardown bookkeeping.
pub struct EngineGuard {
    engine: Arc<dyn Engine>,
    state: Mutex<GuardState>,
}

impl EngineGuard {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Take a usage lease, initializing the engine if this is the first one.
    ///
    /// Concurrent callers are serialized; exactly one performs the
    /// initialization and the rest observe it done.
    pub fn acquire(self: &Arc<Self>) -> EngineLease {
        self.acquire_with(|_| ()).0
    }

    /// Take a usage lease and run `f` against the engine before the guard
    /// lock is released.
    ///
    /// PDFium reports load failures through a process-wide error code, so a
    /// load and the read of its error code must not interleave with another
    /// thread's load.
    pub fn acquire_with<T>(self: &Arc<Self>, f: impl FnOnce(&dyn Engine) -> T) -> (EngineLease, T) {
        let mut state = self.lock_state();
        if !state.initialized {
            log::info!("Initializing PDF engine");
            self.engine.init_library();
            state.initialized = true;
        }
        state.refcount += 1;
        log::trace!("Engine lease acquired ({} outstanding)", state.refcount);

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(self.engine.as_ref())));
        // The lease takes the lock again when dropped.
        drop(state);
        let lease = EngineLease {
            guard: Arc::clone(self),
        };

        match result {
            Ok(value) => (lease, value),
            Err(payload) => {
                drop(lease);
                panic::resume_unwind(payload)
            }
        }
    }

    fn release(&self) {
        let mut state = self.lock_state();
        state.refcount = state.refcount.saturating_sub(1);
        log::trace!("Engine lease released ({} outstanding)", state.refcount);

        if state.refcount == 0 && state.initialized {
            log::info!("Tearing down PDF engine");
            self.engine.destroy_library();
            state.initialized = false;
        }
    }

    pub fn state(&self) -> EngineState {
        let state = self.lock_state();
        EngineState {
            initialized: state.initialized,
            open_documents: state.refcount,
        }
    }

    // A panic while holding the lock cannot leave the counters half-updated,
    // so a poisoned lock is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One unit of engine usage. Dropping it releases the usage.
pub struct EngineLease {
    guard: Arc<EngineGuard>,
}

impl EngineLease {
    pub fn engine(&self) -> &dyn Engine {
        self.guard.engine()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;

    #[test]
    fn test_first_acquire_initializes() {
        let engine = Arc::new(FakeEngine::new());
        let guard = Arc::new(EngineGuard::new(engine.clone()));

        assert!(!guard.state().initialized);
        let lease = guard.acquire();
        assert_eq!(
            guard.state(),
            EngineState {
                initialized: true,
                open_documents: 1
            }
        );
        assert_eq!(engine.stats().init_calls, 1);

        drop(lease);
        assert!(!guard.state().initialized);
        assert_eq!(engine.stats().destroy_calls, 1);
    }

    #[test]
    fn test_teardown_waits_for_last_lease() {
        let engine = Arc::new(FakeEngine::new());
        let guard = Arc::new(EngineGuard::new(engine.clone()));

        let first = guard.acquire();
        let second = guard.acquire();
        assert_eq!(engine.stats().init_calls, 1);

        drop(first);
        assert!(guard.state().initialized);
        assert_eq!(engine.stats().destroy_calls, 0);

        drop(second);
        assert!(!guard.state().initialized);
        assert_eq!(engine.stats().destroy_calls, 1);
    }

    #[test]
    fn test_reinitializes_after_teardown() {
        let engine = Arc::new(FakeEngine::new());
        let guard = Arc::new(EngineGuard::new(engine.clone()));

        drop(guard.acquire());
        drop(guard.acquire());

        let stats = engine.stats();
        assert_eq!(stats.init_calls, 2);
        assert_eq!(stats.destroy_calls, 2);
    }

    #[test]
    fn test_acquire_with_runs_under_lock() {
        let engine = Arc::new(FakeEngine::new());
        let guard = Arc::new(EngineGuard::new(engine.clone()));

        let (lease, last_error) = guard.acquire_with(|engine| engine.last_error());
        assert_eq!(last_error, 0);
        assert_eq!(guard.state().open_documents, 1);

        drop(lease);
        assert!(!guard.state().initialized);
    }

    #[test]
    fn test_acquire_with_releases_on_panic() {
        let engine = Arc::new(FakeEngine::new());
        let guard = Arc::new(EngineGuard::new(engine.clone()));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            guard.acquire_with::<()>(|_| panic!("load failed"))
        }));
        assert!(result.is_err());

        assert_eq!(
            guard.state(),
            EngineState {
                initialized: false,
                open_documents: 0
            }
        );
        assert_eq!(engine.stats().destroy_calls, 1);
    }
}
