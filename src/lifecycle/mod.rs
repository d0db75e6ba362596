//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Build pool & strategy → Spawn monitor/admin → Serve
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → broadcast → tasks drain and exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
