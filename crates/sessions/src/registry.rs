//! In-flight request tracking for a thread (§4.3 Session Registry).
//!
//! One mutex over the whole map; operations are O(1) expected. Termination
//! of a superseded request is cooperative — the registry never waits for it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::session_key::ThreadKey;

/// A cooperative cancellation flag shared between the registry and the
/// request task that owns it.
#[derive(Debug, Default)]
pub struct CancelHandle {
    flagged: AtomicBool,
}

impl CancelHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_cancelled(&self) -> bool {
        self.flagged.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.flagged.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<ThreadKey, Arc<CancelHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` as the current owner of `thread_key`. If a prior
    /// handle is present, it is flagged (supersede) before being replaced —
    /// the prior request is expected to observe the flag and terminate
    /// promptly.
    pub fn register(&self, thread_key: ThreadKey, handle: Arc<CancelHandle>) {
        let mut map = self.inner.lock();
        if let Some(prior) = map.get(&thread_key) {
            prior.set();
        }
        map.insert(thread_key, handle);
    }

    /// Remove the registered handle for `thread_key`, but only if it is the
    /// same instance as `handle` (identity compare). A late-finishing
    /// superseded request that calls `unregister` after a newer request has
    /// already registered must not clobber the new owner.
    pub fn unregister(&self, thread_key: &ThreadKey, handle: &Arc<CancelHandle>) {
        let mut map = self.inner.lock();
        if let Some(current) = map.get(thread_key) {
            if Arc::ptr_eq(current, handle) {
                map.remove(thread_key);
            }
        }
    }

    /// Flag the current handle for `thread_key`, if any is registered.
    /// Returns whether one was found.
    pub fn cancel(&self, thread_key: &ThreadKey) -> bool {
        let map = self.inner.lock();
        match map.get(thread_key) {
            Some(handle) => {
                handle.set();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_same_instance_removes_entry() {
        let registry = SessionRegistry::new();
        let key = ThreadKey::new("u1", "t1");
        let handle = CancelHandle::new();

        registry.register(key.clone(), handle.clone());
        assert_eq!(registry.len(), 1);

        registry.unregister(&key, &handle);
        assert!(registry.is_empty());
    }

    #[test]
    fn registering_over_an_existing_handle_supersedes_it() {
        let registry = SessionRegistry::new();
        let key = ThreadKey::new("u1", "t1");
        let old = CancelHandle::new();
        let new = CancelHandle::new();

        registry.register(key.clone(), old.clone());
        assert!(!old.is_cancelled());

        registry.register(key.clone(), new.clone());
        assert!(old.is_cancelled(), "prior handle must be flagged on supersede");
        assert!(!new.is_cancelled());
    }

    #[test]
    fn unregister_of_superseded_handle_does_not_remove_current_owner() {
        let registry = SessionRegistry::new();
        let key = ThreadKey::new("u1", "t1");
        let old = CancelHandle::new();
        let new = CancelHandle::new();

        registry.register(key.clone(), old.clone());
        registry.register(key.clone(), new.clone());

        // The superseded request finishes late and tries to unregister itself.
        registry.unregister(&key, &old);

        assert_eq!(registry.len(), 1, "new owner must remain registered");
    }

    #[test]
    fn cancel_flags_current_handle_and_reports_presence() {
        let registry = SessionRegistry::new();
        let key = ThreadKey::new("u1", "t1");
        let handle = CancelHandle::new();
        registry.register(key.clone(), handle.clone());

        assert!(registry.cancel(&key));
        assert!(handle.is_cancelled());
    }

    #[test]
    fn cancel_on_unknown_thread_returns_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.cancel(&ThreadKey::new("u1", "absent")));
    }
}
