//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Liveness transitions are emitted from two distinct sources (health
//!   probes and the dispatch path) and are distinguishable in the output
//! - Metric updates are cheap (atomic operations behind the facade)

pub mod logging;
pub mod metrics;
