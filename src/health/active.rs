//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend
//! - Update liveness through the pool on probe outcome changes

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::ServerPool;
use crate::observability::metrics;

pub struct HealthMonitor {
    pool: Arc<ServerPool>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<ServerPool>, mut config: HealthCheckConfig) -> Self {
        // The probe deadline must stay inside the cycle so one sweep always
        // settles before the next tick fires.
        if config.interval_secs > 1 && config.timeout_secs >= config.interval_secs {
            let clamped = config.interval_secs / 2;
            tracing::warn!(
                timeout_secs = config.timeout_secs,
                interval_secs = config.interval_secs,
                clamped_secs = clamped,
                "Health probe timeout must be shorter than the interval, clamping"
            );
            config.timeout_secs = clamped;
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            pool,
            config,
            client,
        }
    }

    /// Run the probe loop until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_secs = self.config.timeout_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend in the current snapshot once.
    ///
    /// Probes run concurrently so one slow backend cannot stretch the sweep
    /// past the interval.
    async fn check_all(&self) {
        let backends = self.pool.snapshot();
        join_all(backends.iter().map(|backend| self.check_one(backend))).await;
    }

    async fn check_one(&self, backend: &Arc<Backend>) {
        let alive = self.probe(backend).await;

        // Only an actual flip touches the pool; repeated identical outcomes
        // stay silent.
        if backend.is_alive() != alive && self.pool.set_status(backend.url(), alive) {
            tracing::info!(
                backend = %backend.url(),
                transition = if alive { "DOWN->UP" } else { "UP->DOWN" },
                "Backend liveness changed"
            );
        }
        metrics::record_backend_health(backend.url().as_str(), alive);
    }

    /// One bounded GET against the backend's probe endpoint. 2xx and 3xx
    /// responses count as alive; any other status, a connection error, or a
    /// timeout counts as dead.
    async fn probe(&self, backend: &Arc<Backend>) -> bool {
        let uri = probe_uri(backend, &self.config.path);
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "relay-proxy-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(backend = %backend.url(), error = %e, "Failed to build health probe");
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                status.is_success() || status.is_redirection()
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.url(), error = %e, "Health probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.url(), "Health probe failed: timeout");
                false
            }
        }
    }
}

fn probe_uri(backend: &Backend, path: &str) -> String {
    format!("{}{}", backend.url().as_str().trim_end_matches('/'), path)
}
