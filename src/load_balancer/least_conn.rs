//! Least Connections selection strategy.

use std::sync::Arc;

use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::Strategy;

/// Selects the alive backend with the fewest in-flight requests.
///
/// The O(N) scan is fine: the fleet is small relative to the request rate.
/// Ties break to the first-registered backend (`min_by_key` keeps the first
/// minimum), which keeps selection deterministic.
#[derive(Debug)]
pub struct LeastConnections {
    pool: Arc<ServerPool>,
}

impl LeastConnections {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self { pool }
    }
}

impl Strategy for LeastConnections {
    fn next(&self) -> Option<Arc<Backend>> {
        self.pool
            .snapshot()
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.active_connections())
            .cloned()
    }
}
