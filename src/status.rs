//! Availability state machine.
//!
//! Every cache operation starts with [`StatusTransitioner::check_available`].
//! The transitioner moves a cache through
//!
//! ```text
//!   Uninitialized ──init()──▶ Available ──close()──▶ Closed
//! ```
//!
//! running registered [`LifecycleHook`]s on each transition. `Closed` is
//! terminal.
//!
//! ## Thread Safety
//! - `check_available` is a single atomic load and may be called from any
//!   number of threads.
//! - `init`, `close`, `add_hook` and `remove_hook` expect a single
//!   coordinating thread. The hook registry sits behind a mutex for interior
//!   mutability only; it does not make concurrent transitions meaningful.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{BoxError, CacheError};

/// Lifecycle state of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Uninitialized,
    Available,
    Closed,
}

impl Status {
    fn as_u8(self) -> u8 {
        match self {
            Status::Uninitialized => 0,
            Status::Available => 1,
            Status::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Status::Uninitialized,
            1 => Status::Available,
            _ => Status::Closed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Uninitialized => "uninitialized",
            Status::Available => "available",
            Status::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Callback run when the owning cache is initialized or closed.
///
/// Returning an error aborts the transition.
pub trait LifecycleHook: Send + Sync {
    fn init(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn close(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Owns the [`Status`] of one cache and its hook registry.
pub struct StatusTransitioner {
    status: AtomicU8,
    hooks: Mutex<Vec<Arc<dyn LifecycleHook>>>,
}

impl StatusTransitioner {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(Status::Uninitialized.as_u8()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn current_status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Fails unless the cache is [`Status::Available`].
    #[inline]
    pub fn check_available(&self) -> Result<(), CacheError> {
        match self.current_status() {
            Status::Available => Ok(()),
            other => Err(CacheError::Unavailable(other)),
        }
    }

    /// Moves `Uninitialized -> Available`.
    ///
    /// Hooks run in registration order. When one fails, the hooks that
    /// already ran are closed again in reverse order and the cache stays
    /// uninitialized.
    pub fn init(&self) -> Result<(), CacheError> {
        let current = self.current_status();
        if current != Status::Uninitialized {
            return Err(CacheError::illegal_state(format!(
                "cannot initialize a cache that is {current}"
            )));
        }

        debug!("cache initializing");
        let hooks = self.hooks.lock().clone();
        for (ran, hook) in hooks.iter().enumerate() {
            if let Err(source) = hook.init() {
                error!(error = %source, "lifecycle hook failed during init");
                for done in hooks[..ran].iter().rev() {
                    if let Err(rollback) = done.close() {
                        error!(error = %rollback, "lifecycle hook failed while rolling back init");
                    }
                }
                return Err(CacheError::Lifecycle {
                    transition: "init",
                    source,
                });
            }
        }

        self.status.store(Status::Available.as_u8(), Ordering::Release);
        debug!("cache available");
        Ok(())
    }

    /// Moves `Available -> Closed`.
    ///
    /// Hooks run in reverse registration order. When one fails, the hooks
    /// that already closed are initialized again in registration order and
    /// the cache stays available.
    pub fn close(&self) -> Result<(), CacheError> {
        let current = self.current_status();
        if current != Status::Available {
            return Err(CacheError::illegal_state(format!(
                "cannot close a cache that is {current}"
            )));
        }

        debug!("cache closing");
        let hooks = self.hooks.lock().clone();
        for (pos, hook) in hooks.iter().enumerate().rev() {
            if let Err(source) = hook.close() {
                error!(error = %source, "lifecycle hook failed during close");
                for done in &hooks[pos + 1..] {
                    if let Err(rollback) = done.init() {
                        error!(error = %rollback, "lifecycle hook failed while rolling back close");
                    }
                }
                return Err(CacheError::Lifecycle {
                    transition: "close",
                    source,
                });
            }
        }

        self.status.store(Status::Closed.as_u8(), Ordering::Release);
        debug!("cache closed");
        Ok(())
    }

    /// Registers a hook. Registering the same hook twice is a no-op.
    pub fn add_hook(&self, hook: Arc<dyn LifecycleHook>) -> Result<(), CacheError> {
        self.check_quiescent("add")?;
        let mut hooks = self.hooks.lock();
        if !hooks.iter().any(|existing| Arc::ptr_eq(existing, &hook)) {
            hooks.push(hook);
        }
        Ok(())
    }

    /// Unregisters a hook. Returns whether it was registered.
    pub fn remove_hook(&self, hook: &Arc<dyn LifecycleHook>) -> Result<bool, CacheError> {
        self.check_quiescent("remove")?;
        let mut hooks = self.hooks.lock();
        let before = hooks.len();
        hooks.retain(|existing| !Arc::ptr_eq(existing, hook));
        Ok(hooks.len() != before)
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    fn check_quiescent(&self, action: &str) -> Result<(), CacheError> {
        if self.current_status() == Status::Available {
            return Err(CacheError::illegal_state(format!(
                "cannot {action} lifecycle hooks while the cache is available"
            )));
        }
        Ok(())
    }
}

impl Default for StatusTransitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusTransitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTransitioner")
            .field("status", &self.current_status())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_init: bool,
        fail_close: bool,
    }

    impl LifecycleHook for Recording {
        fn init(&self) -> Result<(), BoxError> {
            self.log.lock().push(format!("init:{}", self.name));
            if self.fail_init {
                return Err("init refused".into());
            }
            Ok(())
        }

        fn close(&self) -> Result<(), BoxError> {
            self.log.lock().push(format!("close:{}", self.name));
            if self.fail_close {
                return Err("close refused".into());
            }
            Ok(())
        }
    }

    fn hook(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Recording {
        Recording {
            name,
            log: log.clone(),
            ..Recording::default()
        }
    }

    #[test]
    fn starts_uninitialized_and_unavailable() {
        let t = StatusTransitioner::new();
        assert_eq!(t.current_status(), Status::Uninitialized);
        assert!(matches!(
            t.check_available(),
            Err(CacheError::Unavailable(Status::Uninitialized))
        ));
    }

    #[test]
    fn init_then_close() {
        let t = StatusTransitioner::new();
        t.init().unwrap();
        assert!(t.check_available().is_ok());
        t.close().unwrap();
        assert_eq!(t.current_status(), Status::Closed);
        assert!(matches!(
            t.check_available(),
            Err(CacheError::Unavailable(Status::Closed))
        ));
    }

    #[test]
    fn init_twice_keeps_available() {
        let t = StatusTransitioner::new();
        t.init().unwrap();
        assert!(matches!(t.init(), Err(CacheError::IllegalState(_))));
        assert_eq!(t.current_status(), Status::Available);
    }

    #[test]
    fn closed_is_terminal() {
        let t = StatusTransitioner::new();
        t.init().unwrap();
        t.close().unwrap();
        assert!(t.init().is_err());
        assert!(t.close().is_err());
        assert_eq!(t.current_status(), Status::Closed);
    }

    #[test]
    fn close_before_init_fails() {
        let t = StatusTransitioner::new();
        assert!(matches!(t.close(), Err(CacheError::IllegalState(_))));
        assert_eq!(t.current_status(), Status::Uninitialized);
    }

    #[test]
    fn hooks_run_in_order_and_close_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = StatusTransitioner::new();
        t.add_hook(Arc::new(hook("a", &log))).unwrap();
        t.add_hook(Arc::new(hook("b", &log))).unwrap();

        t.init().unwrap();
        t.close().unwrap();

        assert_eq!(*log.lock(), vec!["init:a", "init:b", "close:b", "close:a"]);
    }

    #[test]
    fn failing_init_hook_rolls_back() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = StatusTransitioner::new();
        t.add_hook(Arc::new(hook("a", &log))).unwrap();
        t.add_hook(Arc::new(Recording {
            fail_init: true,
            ..hook("b", &log)
        }))
        .unwrap();
        t.add_hook(Arc::new(hook("c", &log))).unwrap();

        let err = t.init().unwrap_err();
        assert!(matches!(
            err,
            CacheError::Lifecycle {
                transition: "init",
                ..
            }
        ));
        assert_eq!(t.current_status(), Status::Uninitialized);
        assert_eq!(*log.lock(), vec!["init:a", "init:b", "close:a"]);
    }

    #[test]
    fn failing_close_hook_keeps_available() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = StatusTransitioner::new();
        t.add_hook(Arc::new(Recording {
            fail_close: true,
            ..hook("a", &log)
        }))
        .unwrap();
        t.init().unwrap();

        assert!(matches!(t.close(), Err(CacheError::Lifecycle { .. })));
        assert_eq!(t.current_status(), Status::Available);
    }

    #[test]
    fn failing_close_reinitializes_hooks_already_closed() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let t = StatusTransitioner::new();
        t.add_hook(Arc::new(hook("a", &log))).unwrap();
        t.add_hook(Arc::new(Recording {
            fail_close: true,
            ..hook("b", &log)
        }))
        .unwrap();
        t.add_hook(Arc::new(hook("c", &log))).unwrap();
        t.add_hook(Arc::new(hook("d", &log))).unwrap();
        t.init().unwrap();
        log.lock().clear();

        assert!(t.close().is_err());
        assert_eq!(
            *log.lock(),
            vec!["close:d", "close:c", "close:b", "init:c", "init:d"]
        );
        assert_eq!(t.current_status(), Status::Available);
    }

    #[test]
    fn hooks_are_frozen_while_available() {
        let t = StatusTransitioner::new();
        let h: Arc<dyn LifecycleHook> = Arc::new(Recording::default());
        t.add_hook(h.clone()).unwrap();
        t.add_hook(h.clone()).unwrap();
        assert_eq!(t.hook_count(), 1);

        t.init().unwrap();
        assert!(t.add_hook(Arc::new(Recording::default())).is_err());
        assert!(t.remove_hook(&h).is_err());

        t.close().unwrap();
        assert!(t.remove_hook(&h).unwrap());
        assert!(!t.remove_hook(&h).unwrap());
    }
}
