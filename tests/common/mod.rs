//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use relay_proxy::config::ProxyConfig;
use relay_proxy::http::HttpServer;
use relay_proxy::lifecycle::Shutdown;
use relay_proxy::load_balancer::pool::ServerPool;

/// Start a mock backend that returns a fixed body; returns its address.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_mock_backend_with_delay(response, Duration::ZERO).await
}

/// Start a mock backend that sleeps before responding, to hold the proxy's
/// in-flight count up while the request is pending.
pub async fn start_mock_backend_with_delay(
    response: &'static str,
    delay: Duration,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Reserve an address that refuses connections: bind, note the port, drop.
#[allow(dead_code)]
pub async fn dead_backend_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Proxy config over the given backends, with background tasks disabled so
/// tests control them explicitly.
pub fn proxy_config(backends: &[SocketAddr]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.backends = backends.iter().map(|a| format!("http://{a}")).collect();
    config.health_check.enabled = false;
    config.admin.enabled = false;
    config
}

/// Spawn the proxy on an ephemeral port; returns its address, the pool
/// handle, and the shutdown coordinator keeping it alive.
pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Arc<ServerPool>, Shutdown) {
    let server = HttpServer::new(config);
    let pool = server.pool();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Let the accept loop come up before tests fire requests.
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, pool, shutdown)
}

/// A client that never reuses connections, so every request exercises the
/// full dispatch path.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
