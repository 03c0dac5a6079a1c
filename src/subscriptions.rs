//! Owned registry of realtime-listener teardown handles.
//!
//! A screen creates one [`SubscriptionManager`], opens listeners through it and
//! drops it when it goes away. Every teardown runs exactly once: on `close`,
//! on being replaced under the same key, on `close_all`, or on drop.

use log::debug;
use std::collections::BTreeMap;
use std::fmt;

type Teardown = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct SubscriptionManager {
    active: BTreeMap<String, Teardown>,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `teardown` under `key`. An existing subscription with the same
    /// key is torn down first. Returns whether one was replaced.
    pub fn open<F>(&mut self, key: impl Into<String>, teardown: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let key = key.into();
        let replaced = self.active.insert(key.clone(), Box::new(teardown));
        match replaced {
            Some(previous) => {
                debug!("Replacing subscription '{}'", key);
                previous();
                true
            }
            None => false,
        }
    }

    /// Tears down one subscription. Returns false if nothing was open under `key`.
    pub fn close(&mut self, key: &str) -> bool {
        match self.active.remove(key) {
            Some(teardown) => {
                debug!("Closing subscription '{}'", key);
                teardown();
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for (key, teardown) in std::mem::take(&mut self.active) {
            debug!("Closing subscription '{}'", key);
            teardown();
        }
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        let make = move || {
            let inner = handle.clone();
            Box::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[test]
    fn test_close_runs_teardown_once() {
        let (count, make) = counter();
        let mut manager = SubscriptionManager::new();

        assert!(!manager.open("deals", make()));
        assert!(manager.is_open("deals"));
        assert!(manager.close("deals"));
        assert!(!manager.close("deals"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_reopening_replaces_previous_listener() {
        let (count, make) = counter();
        let mut manager = SubscriptionManager::new();

        manager.open("deals", make());
        assert!(manager.open("deals", make()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_drop_releases_everything() {
        let (count, make) = counter();
        {
            let mut manager = SubscriptionManager::new();
            manager.open("deals", make());
            manager.open("lenders", make());
            manager.open("profile", make());
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_close_all_then_drop_does_not_double_release() {
        let (count, make) = counter();
        let mut manager = SubscriptionManager::new();
        manager.open("deals", make());
        manager.close_all();
        drop(manager);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
