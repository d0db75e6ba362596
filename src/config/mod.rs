//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → ProxyConfig (immutable after startup)
//!     → shared with all subsystems at wiring time
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Invalid backend addresses are skipped at startup with a warning,
//!   never fatal

pub mod loader;
pub mod schema;

pub use loader::{load, ConfigError};
pub use schema::{
    AdminConfig, HealthCheckConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    SelectionStrategy, TimeoutConfig,
};
