//! Admin API surface.
//!
//! Exposes the registry operations over a separate listener: pool status
//! and backend list reads, backend add/remove writes. Requests authenticate
//! with a bearer token.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::AdminConfig;
use crate::load_balancer::pool::ServerPool;

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<ServerPool>,
    pub api_key: String,
}

/// Build the admin router.
pub fn router(pool: Arc<ServerPool>, config: &AdminConfig) -> Router {
    let state = AdminState {
        pool,
        api_key: config.api_key.clone(),
    };

    Router::new()
        .route("/status", get(handlers::get_status))
        .route(
            "/backends",
            get(handlers::list_backends)
                .post(handlers::add_backend)
                .delete(handlers::remove_backend),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .with_state(state)
}

/// Serve the admin API until the shutdown signal fires.
pub async fn serve(
    pool: Arc<ServerPool>,
    config: AdminConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    let app = router(pool, &config);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
