//! Failure injection: dispatch-path down marking and health recovery.

use std::time::{Duration, Instant};

use relay_proxy::config::HealthCheckConfig;
use relay_proxy::health::HealthMonitor;

mod common;

#[tokio::test]
async fn connection_failure_marks_backend_down() {
    let dead = common::dead_backend_addr().await;
    let live = common::start_mock_backend("backend-live").await;

    let config = common::proxy_config(&[dead, live]);
    let (addr, pool, _shutdown) = common::spawn_proxy(config).await;

    let client = common::http_client();

    // Round-robin starts at the first-registered backend, which refuses the
    // connection.
    let res = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "backend error");

    // Eager detection: the pool already shows the backend dead, ahead of
    // any health probe.
    let snapshot = pool.snapshot();
    assert!(!snapshot[0].is_alive());
    assert!(snapshot[1].is_alive());

    // Every subsequent request avoids it.
    for _ in 0..4 {
        let res = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "backend-live");
    }
}

#[tokio::test]
async fn no_alive_backends_fail_fast_with_503() {
    let dead = common::dead_backend_addr().await;

    let config = common::proxy_config(&[dead]);
    let (addr, pool, _shutdown) = common::spawn_proxy(config).await;

    let client = common::http_client();

    // The first request trips the eager detector.
    let res = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), 503);
    assert!(!pool.snapshot()[0].is_alive());

    // With nothing alive, every request is refused immediately.
    let start = Instant::now();
    for _ in 0..10 {
        let res = client
            .get(format!("http://{addr}/"))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), 503);
        assert_eq!(res.text().await.unwrap(), "service unavailable");
    }
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "unavailable responses must not block or queue"
    );
}

#[tokio::test]
async fn health_monitor_marks_unreachable_backend_down() {
    let dead = common::dead_backend_addr().await;

    let config = common::proxy_config(&[dead]);
    let (_addr, pool, shutdown) = common::spawn_proxy(config).await;

    let monitor = HealthMonitor::new(
        pool.clone(),
        HealthCheckConfig {
            enabled: true,
            interval_secs: 1,
            timeout_secs: 1,
            path: "/".to_string(),
        },
    );
    let monitor_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        monitor.run(monitor_shutdown).await;
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.snapshot()[0].is_alive() {
        assert!(Instant::now() < deadline, "probe never marked the backend down");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn health_monitor_revives_recovered_backend() {
    let live = common::start_mock_backend("backend-live").await;

    let config = common::proxy_config(&[live]);
    let (addr, pool, shutdown) = common::spawn_proxy(config).await;

    // Knock the backend down the way the dispatch path would.
    let url = pool.snapshot()[0].url().clone();
    assert!(pool.set_status(&url, false));

    let client = common::http_client();
    let res = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), 503);

    let monitor = HealthMonitor::new(
        pool.clone(),
        HealthCheckConfig {
            enabled: true,
            interval_secs: 1,
            timeout_secs: 1,
            path: "/".to_string(),
        },
    );
    let monitor_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        monitor.run(monitor_shutdown).await;
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while !pool.snapshot()[0].is_alive() {
        assert!(Instant::now() < deadline, "probe never revived the backend");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let res = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "backend-live");
}
