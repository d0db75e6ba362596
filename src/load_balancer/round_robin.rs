//! Round-robin selection strategy.

use std::sync::Arc;

use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::Strategy;

/// Rotates through backends in registration order.
///
/// The cursor lives in the pool and advances by exactly one step per call,
/// regardless of how many dead backends are skipped, so distribution stays
/// fair over time even with part of the fleet down.
#[derive(Debug)]
pub struct RoundRobin {
    pool: Arc<ServerPool>,
}

impl RoundRobin {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self { pool }
    }
}

impl Strategy for RoundRobin {
    fn next(&self) -> Option<Arc<Backend>> {
        let backends = self.pool.snapshot();
        if backends.is_empty() {
            return None;
        }

        // The scan is bounded by the snapshot length and the cursor is
        // reduced modulo it, so concurrent add/remove cannot push the index
        // out of range.
        let len = backends.len();
        let start = self.pool.next_cursor();
        for i in 0..len {
            let backend = &backends[start.wrapping_add(i) % len];
            if backend.is_alive() {
                return Some(backend.clone());
            }
        }
        None
    }
}
