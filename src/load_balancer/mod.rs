//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives
//!     → strategy reads a pool snapshot
//!         - round_robin.rs (rotate through backends via the pool cursor)
//!         - least_conn.rs (pick backend with fewest in-flight requests)
//!     → backend.rs (connection guard brackets the forwarding call)
//!     → pool.rs (liveness updates flow back in on failures)
//! ```
//!
//! # Design Decisions
//! - Strategies hold only a pool handle; all shared state lives in the pool
//! - Dead backends are excluded from selection
//! - Selection never holds the pool lock across I/O

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;

use crate::config::SelectionStrategy;
use backend::Backend;
use pool::ServerPool;

/// Common contract of the selection strategies.
pub trait Strategy: Send + Sync {
    /// Pick one alive backend, or `None` when nothing can serve.
    fn next(&self) -> Option<Arc<Backend>>;
}

/// Build the configured strategy over the given pool.
pub fn build_strategy(kind: SelectionStrategy, pool: Arc<ServerPool>) -> Arc<dyn Strategy> {
    match kind {
        SelectionStrategy::RoundRobin => Arc::new(round_robin::RoundRobin::new(pool)),
        SelectionStrategy::LeastConnections => {
            Arc::new(least_conn::LeastConnections::new(pool))
        }
    }
}
