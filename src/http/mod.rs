//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request-id and trace layers)
//!     → strategy picks an alive backend (503 if none)
//!     → connection guard pins the backend for the forwarding call
//!     → URI rewritten, request forwarded, response streamed back
//!     → failures classified; connection-class errors mark the backend down
//! ```

pub mod server;

pub use server::HttpServer;
