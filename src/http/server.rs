//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers and middleware
//! - Dispatch every inbound request through the selection strategy
//! - Forward to the chosen backend with a fixed timeout ceiling
//! - Classify forwarding failures and mark backends down eagerly
//!
//! # Design Decisions
//! - Connection-class failures flip liveness immediately, ahead of the next
//!   health probe; other upstream errors leave liveness alone
//! - The connection guard brackets the whole forwarding call, so in-flight
//!   counts return to zero on every exit path
//! - All failures answer 503 with a plain-text body

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{uri::InvalidUri, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::load_balancer::backend::{Backend, ConnectionGuard};
use crate::load_balancer::pool::ServerPool;
use crate::load_balancer::{build_strategy, Strategy};
use crate::observability::metrics;

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ServerPool>,
    pub strategy: Arc<dyn Strategy>,
    pub client: Client<HttpConnector, Body>,
    pub request_timeout: Duration,
}

/// The public-facing HTTP server.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Build the server from configuration: seed the pool with the initial
    /// backends (invalid addresses are skipped with a warning) and wire the
    /// configured strategy over it.
    pub fn new(config: ProxyConfig) -> Self {
        let pool = Arc::new(ServerPool::new());
        for raw in &config.backends {
            match Backend::parse(raw) {
                Ok(backend) => {
                    if let Err(e) = pool.add(Arc::new(backend)) {
                        tracing::warn!(error = %e, "Skipping backend");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping invalid backend");
                }
            }
        }

        let strategy = build_strategy(config.strategy, pool.clone());

        let mut connector = HttpConnector::new();
        connector
            .set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            pool: pool.clone(),
            strategy,
            client,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(state);

        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Handle to the backend registry, for wiring the health monitor and
    /// admin API.
    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve connections until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = ?self.config.strategy,
            backends = self.pool.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler: one invocation per inbound request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let Some(backend) = state.strategy.next() else {
        tracing::warn!(method = %method, path = %path, "No backend available");
        metrics::record_request(&method, 503, "none", start);
        return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response();
    };

    // Pins the in-flight count for the whole forwarding call. Drop runs even
    // when the client disconnects and this future is cancelled.
    let guard = ConnectionGuard::acquire(backend);
    let backend_id = guard.url().to_string();

    let upstream_request = match rewrite_request(request, guard.backend()) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(backend = %backend_id, error = %e, "Failed to rewrite request URI");
            metrics::record_request(&method, 503, &backend_id, start);
            return (StatusCode::SERVICE_UNAVAILABLE, "backend error").into_response();
        }
    };

    match time::timeout(state.request_timeout, state.client.request(upstream_request)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            tracing::debug!(
                method = %method,
                path = %path,
                backend = %backend_id,
                status = %status,
                "Request proxied"
            );
            metrics::record_request(&method, status.as_u16(), &backend_id, start);

            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(error)) => {
            if is_backend_down_error(&error) {
                // Eager failure detection: flip liveness now instead of
                // waiting for the next health probe. set_status reports the
                // flip, so concurrent failures emit a single event.
                if state.pool.set_status(guard.url(), false) {
                    tracing::warn!(
                        backend = %backend_id,
                        error = %error,
                        "Backend marked down by dispatch path"
                    );
                    metrics::record_backend_down(&backend_id);
                }
            } else {
                tracing::error!(backend = %backend_id, error = %error, "Upstream request failed");
            }
            metrics::record_request(&method, 503, &backend_id, start);
            (StatusCode::SERVICE_UNAVAILABLE, "backend error").into_response()
        }
        Err(_) => {
            // Our own ceiling, not the backend refusing the connection:
            // surfaced as an upstream error without touching liveness.
            tracing::error!(
                backend = %backend_id,
                timeout = ?state.request_timeout,
                "Upstream request timed out"
            );
            metrics::record_request(&method, 503, &backend_id, start);
            (StatusCode::SERVICE_UNAVAILABLE, "backend error").into_response()
        }
    }
}

/// Rewrite the inbound request to target the backend: scheme and authority
/// come from the backend URL and the backend's path prefix is prepended to
/// the request path.
fn rewrite_request(
    request: Request<Body>,
    backend: &Arc<Backend>,
) -> Result<Request<Body>, InvalidUri> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let url = backend.url();
    // Host presence is validated when the backend is parsed.
    let host = url.host_str().unwrap_or_default();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let prefix = url.path().trim_end_matches('/');

    let target = format!("{}://{}{}{}", url.scheme(), authority, prefix, path_and_query);
    parts.uri = target.parse::<Uri>()?;

    Ok(Request::from_parts(parts, body))
}

/// Classify a forwarding failure. Connection-establishment failures
/// (including DNS resolution) and abruptly terminated streams mean the
/// backend itself is gone; timeouts and protocol-level failures do not.
fn is_backend_down_error(error: &hyper_util::client::legacy::Error) -> bool {
    if error.is_connect() {
        return true;
    }
    is_connection_class(error)
}

/// Walk an error's source chain looking for connection-class causes.
fn is_connection_class(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_canceled() {
                // Cancellation comes from our side, not the backend's.
                return false;
            }
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            );
        }
        current = err.source();
    }
    false
}
