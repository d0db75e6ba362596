//! Admin request handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::admin::AdminState;
use crate::load_balancer::backend::Backend;

#[derive(Serialize)]
pub struct BackendStatus {
    pub url: String,
    pub alive: bool,
    pub current_connections: usize,
}

#[derive(Serialize)]
pub struct PoolStatus {
    pub total_backends: usize,
    pub active_backends: usize,
    pub backends: Vec<BackendStatus>,
}

#[derive(Deserialize)]
pub struct BackendPayload {
    pub url: String,
}

fn backend_statuses(state: &AdminState) -> Vec<BackendStatus> {
    state
        .pool
        .snapshot()
        .iter()
        .map(|b| BackendStatus {
            url: b.url().to_string(),
            alive: b.is_alive(),
            current_connections: b.active_connections(),
        })
        .collect()
}

/// GET /status
pub async fn get_status(State(state): State<AdminState>) -> Json<PoolStatus> {
    let backends = backend_statuses(&state);
    let active_backends = backends.iter().filter(|b| b.alive).count();

    Json(PoolStatus {
        total_backends: backends.len(),
        active_backends,
        backends,
    })
}

/// GET /backends
pub async fn list_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    Json(backend_statuses(&state))
}

/// POST /backends
pub async fn add_backend(
    State(state): State<AdminState>,
    Json(payload): Json<BackendPayload>,
) -> impl IntoResponse {
    let backend = match Backend::parse(&payload.url) {
        Ok(backend) => backend,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("invalid backend URL: {e}"))
                .into_response()
        }
    };

    let url = backend.url().clone();
    match state.pool.add(Arc::new(backend)) {
        Ok(()) => {
            tracing::info!(backend = %url, "Backend added via admin API");
            StatusCode::CREATED.into_response()
        }
        Err(e) => (StatusCode::CONFLICT, e.to_string()).into_response(),
    }
}

/// DELETE /backends
pub async fn remove_backend(
    State(state): State<AdminState>,
    Json(payload): Json<BackendPayload>,
) -> impl IntoResponse {
    let url = match Url::parse(payload.url.trim()) {
        Ok(url) => url,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("invalid backend URL: {e}"))
                .into_response()
        }
    };

    if state.pool.remove(&url) {
        tracing::info!(backend = %url, "Backend removed via admin API");
        StatusCode::OK.into_response()
    } else {
        (StatusCode::NOT_FOUND, "backend not found").into_response()
    }
}
