//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track active connections (for Least Connections LB)
//! - Track liveness, set by health probes or dispatch failure detection

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Error returned when a raw backend address fails validation.
#[derive(Debug, thiserror::Error)]
pub enum BackendParseError {
    #[error("invalid backend URL {raw:?}: {source}")]
    Invalid {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported scheme {scheme:?} in backend URL {raw:?}, expected http or https")]
    UnsupportedScheme { raw: String, scheme: String },
    #[error("backend URL {raw:?} has no host")]
    MissingHost { raw: String },
}

/// A single upstream server.
///
/// The normalized URL is the backend's identity and is immutable after
/// creation. Liveness and the in-flight connection count are the only
/// mutable state; both are atomic so the dispatcher and health monitor can
/// update them without the pool lock.
#[derive(Debug)]
pub struct Backend {
    url: Url,
    alive: AtomicBool,
    active_connections: AtomicUsize,
}

impl Backend {
    /// Parse and validate a raw address.
    ///
    /// Rejects anything that is not an absolute http/https URL with a host.
    /// New backends start alive; the first health probe corrects that if
    /// needed.
    pub fn parse(raw: &str) -> Result<Self, BackendParseError> {
        let url = Url::parse(raw.trim()).map_err(|source| BackendParseError::Invalid {
            raw: raw.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(BackendParseError::UnsupportedScheme {
                    raw: raw.to_string(),
                    scheme: other.to_string(),
                })
            }
        }
        if url.host_str().is_none() {
            return Err(BackendParseError::MissingHost {
                raw: raw.to_string(),
            });
        }

        Ok(Self {
            url,
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        })
    }

    /// The backend's identity.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Update liveness, returning whether the stored state actually changed.
    ///
    /// The swap makes concurrent identical updates idempotent: two requests
    /// failing against the same dead backend produce a single transition.
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::SeqCst) != alive
    }

    /// Number of requests currently in flight against this backend.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// RAII guard bracketing one forwarded request.
///
/// Construction increments the backend's in-flight count and `Drop`
/// decrements it. The guard lives across the entire forwarding call, so the
/// decrement runs on every exit path, including panics and client
/// disconnects that drop the request future mid-flight.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn acquire(backend: Arc<Backend>) -> Self {
        backend.active_connections.fetch_add(1, Ordering::SeqCst);
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for ConnectionGuard {
    type Target = Backend;

    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_and_validates() {
        let b = Backend::parse(" http://127.0.0.1:9001 ").unwrap();
        assert_eq!(b.url().as_str(), "http://127.0.0.1:9001/");
        assert!(b.is_alive());
        assert_eq!(b.active_connections(), 0);

        assert!(matches!(
            Backend::parse("127.0.0.1:9001"),
            Err(BackendParseError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            Backend::parse("ftp://127.0.0.1:9001"),
            Err(BackendParseError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            Backend::parse("not a url"),
            Err(BackendParseError::Invalid { .. })
        ));
    }

    #[test]
    fn guard_brackets_connection_count() {
        let backend = Arc::new(Backend::parse("http://127.0.0.1:9001").unwrap());

        let g1 = ConnectionGuard::acquire(backend.clone());
        let g2 = ConnectionGuard::acquire(backend.clone());
        assert_eq!(backend.active_connections(), 2);

        drop(g1);
        assert_eq!(backend.active_connections(), 1);
        drop(g2);
        assert_eq!(backend.active_connections(), 0);
    }

    #[test]
    fn guard_releases_on_panic() {
        let backend = Arc::new(Backend::parse("http://127.0.0.1:9001").unwrap());
        let cloned = backend.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = ConnectionGuard::acquire(cloned);
            panic!("forwarding blew up");
        }));

        assert!(result.is_err());
        assert_eq!(backend.active_connections(), 0);
    }

    #[test]
    fn set_alive_reports_transitions_once() {
        let backend = Backend::parse("http://127.0.0.1:9001").unwrap();

        assert!(backend.set_alive(false), "first down-marking is a flip");
        assert!(!backend.set_alive(false), "repeat down-marking is a no-op");
        assert!(!backend.is_alive());

        assert!(backend.set_alive(true));
        assert!(!backend.set_alive(true));
        assert!(backend.is_alive());
    }
}
