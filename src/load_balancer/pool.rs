//! Server pool: the registry of upstream backends.
//!
//! # Responsibilities
//! - Own the ordered backend list (registration order drives round-robin)
//! - Provide thread-safe add/remove/status updates
//! - Hand out point-in-time snapshots for selection and probing
//!
//! # Design Decisions
//! - Readers-writer lock, never held across network I/O
//! - The round-robin cursor lives here so every selection shares it
//! - Duplicate registrations are rejected, never replaced

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use url::Url;

use crate::load_balancer::backend::Backend;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("backend {0} is already registered")]
    Duplicate(Url),
}

/// The registry of backends.
///
/// One instance is created at startup and shared by handle with the
/// strategies, the health monitor, the dispatcher, and the admin API.
#[derive(Debug, Default)]
pub struct ServerPool {
    backends: RwLock<Vec<Arc<Backend>>>,
    cursor: AtomicUsize,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, appending it in registration order.
    ///
    /// Re-registering an identity that is already present is rejected;
    /// replacing would silently discard the live connection count.
    pub fn add(&self, backend: Arc<Backend>) -> Result<(), PoolError> {
        let mut backends = self.backends.write().expect("pool lock poisoned");
        if backends.iter().any(|b| b.url() == backend.url()) {
            return Err(PoolError::Duplicate(backend.url().clone()));
        }
        backends.push(backend);
        Ok(())
    }

    /// Remove the backend with the given identity. Returns whether one was
    /// found. In-flight requests keep their `Arc` and drain independently.
    pub fn remove(&self, url: &Url) -> bool {
        let mut backends = self.backends.write().expect("pool lock poisoned");
        match backends.iter().position(|b| b.url() == url) {
            Some(idx) => {
                backends.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Update liveness of the backend with the given identity.
    ///
    /// An absent identity is a no-op returning `false` — the caller may hold
    /// a reference to a backend that lost a race with removal. Otherwise
    /// returns whether the liveness actually flipped, so callers emit
    /// transition events exactly once.
    pub fn set_status(&self, url: &Url, alive: bool) -> bool {
        let backends = self.backends.write().expect("pool lock poisoned");
        match backends.iter().find(|b| b.url() == url) {
            Some(backend) => backend.set_alive(alive),
            None => false,
        }
    }

    /// A consistent point-in-time copy of the backend list.
    ///
    /// Selection and probing operate on the snapshot so the lock is released
    /// before any blocking call.
    pub fn snapshot(&self) -> Vec<Arc<Backend>> {
        self.backends.read().expect("pool lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.backends.read().expect("pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance the shared round-robin cursor by one step.
    ///
    /// The raw value grows without bound (wrapping on overflow); callers
    /// reduce it modulo their snapshot length, which keeps indices in range
    /// across concurrent add/remove.
    pub(crate) fn next_cursor(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(raw: &str) -> Arc<Backend> {
        Arc::new(Backend::parse(raw).unwrap())
    }

    #[test]
    fn add_rejects_duplicates() {
        let pool = ServerPool::new();
        pool.add(backend("http://127.0.0.1:9001")).unwrap();

        let err = pool.add(backend("http://127.0.0.1:9001")).unwrap_err();
        assert!(matches!(err, PoolError::Duplicate(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let pool = ServerPool::new();
        let b = backend("http://127.0.0.1:9001");
        pool.add(b.clone()).unwrap();

        assert!(pool.remove(b.url()));
        assert!(!pool.remove(b.url()));
        assert!(pool.is_empty());
    }

    #[test]
    fn set_status_on_absent_identity_is_noop() {
        let pool = ServerPool::new();
        let ghost = Url::parse("http://127.0.0.1:9999").unwrap();

        assert!(!pool.set_status(&ghost, false));
    }

    #[test]
    fn set_status_reports_flips_only() {
        let pool = ServerPool::new();
        let b = backend("http://127.0.0.1:9001");
        pool.add(b.clone()).unwrap();

        assert!(pool.set_status(b.url(), false));
        assert!(!pool.set_status(b.url(), false));
        assert!(!b.is_alive());
        assert!(pool.set_status(b.url(), true));
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let pool = ServerPool::new();
        pool.add(backend("http://127.0.0.1:9001")).unwrap();
        pool.add(backend("http://127.0.0.1:9002")).unwrap();
        pool.add(backend("http://127.0.0.1:9003")).unwrap();

        let urls: Vec<String> = pool
            .snapshot()
            .iter()
            .map(|b| b.url().to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://127.0.0.1:9001/",
                "http://127.0.0.1:9002/",
                "http://127.0.0.1:9003/",
            ]
        );
    }

    #[test]
    fn concurrent_selection_survives_removal() {
        use crate::load_balancer::{round_robin::RoundRobin, Strategy};
        use std::sync::atomic::{AtomicBool, Ordering};

        let pool = Arc::new(ServerPool::new());
        for port in 9001..9009 {
            pool.add(backend(&format!("http://127.0.0.1:{port}"))).unwrap();
        }

        let strategy = RoundRobin::new(pool.clone());
        let stop = Arc::new(AtomicBool::new(false));

        let selectors: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    let strategy = RoundRobin::new(pool);
                    while !stop.load(Ordering::Relaxed) {
                        // Must never panic or index out of range while the
                        // writer below churns the list.
                        let _ = strategy.next();
                    }
                })
            })
            .collect();

        for port in 9001..9008 {
            let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
            assert!(pool.remove(&url));
        }
        stop.store(true, Ordering::Relaxed);
        for handle in selectors {
            handle.join().unwrap();
        }

        // Only the last backend is left; every selection must return it.
        for _ in 0..10 {
            let picked = strategy.next().unwrap();
            assert_eq!(picked.url().as_str(), "http://127.0.0.1:9008/");
        }
    }
}
