//! End-to-end scenarios: the full lifecycle against a real probe listener,
//! with the store stood in by the in-memory mock.
use std::sync::Arc;

use reqwest::StatusCode;

use worker_alive::config::Config;
use worker_alive::lifecycle::LifecycleCoordinator;
use worker_alive::mock::MockRedisClient;
use worker_alive::scheduler::MemoryScheduler;

fn test_config(hostname: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        redis_url: "redis://localhost:6379/".to_string(),
        hostname: hostname.to_string(),
        liveness_key_prefix: "alive-test".to_string(),
        registered_instance_key_prefix: "registered-test".to_string(),
        queue_prefix: "alive".to_string(),
        time_to_live: 10,
        registration_ttl: 40,
        disabled: false,
        export_prometheus: false,
    }
}

async fn probe(addr: std::net::SocketAddr) -> reqwest::Response {
    reqwest::get(format!("http://{}/", addr))
        .await
        .expect("failed to reach the probe listener")
}

#[tokio::test]
async fn probe_tracks_heartbeat_freshness() {
    let mock = MockRedisClient::new();
    let scheduler = MemoryScheduler::new();
    let mut coordinator = LifecycleCoordinator::new(
        test_config("worker-1"),
        Arc::new(mock.clone()),
        Arc::new(scheduler),
        None,
    );

    coordinator.on_startup().await.unwrap();
    let addr = coordinator.probe_addr().unwrap();

    // Registered and refreshed at startup: immediately alive.
    assert!(mock.contains_key("registered-test::worker-1"));
    assert_eq!(probe(addr).await.status(), StatusCode::OK);

    // TTL reached with no further refresh: the probe flips to non-200.
    mock.advance_clock(11);
    assert_eq!(probe(addr).await.status(), StatusCode::NOT_FOUND);

    // A refresh brings it back.
    coordinator.heartbeat().refresh().await.unwrap();
    assert_eq!(probe(addr).await.status(), StatusCode::OK);

    coordinator.on_shutdown().await;
}

#[tokio::test]
async fn two_instances_register_and_unregister_independently() {
    let mock = MockRedisClient::new();

    let mut one = LifecycleCoordinator::new(
        test_config("worker-1"),
        Arc::new(mock.clone()),
        Arc::new(MemoryScheduler::new()),
        None,
    );
    let mut two = LifecycleCoordinator::new(
        test_config("worker-2"),
        Arc::new(mock.clone()),
        Arc::new(MemoryScheduler::new()),
        None,
    );

    one.on_startup().await.unwrap();
    two.on_startup().await.unwrap();

    assert!(mock.contains_key("registered-test::worker-1"));
    assert!(mock.contains_key("registered-test::worker-2"));

    one.on_shutdown().await;

    assert!(!mock.contains_key("registered-test::worker-1"));
    assert!(mock.contains_key("registered-test::worker-2"));

    two.on_shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_the_listener_and_cleans_up() {
    let mock = MockRedisClient::new();
    let scheduler = MemoryScheduler::new();
    let mut coordinator = LifecycleCoordinator::new(
        test_config("worker-1"),
        Arc::new(mock.clone()),
        Arc::new(scheduler.clone()),
        None,
    );

    coordinator.on_startup().await.unwrap();
    let addr = coordinator.probe_addr().unwrap();
    assert_eq!(probe(addr).await.status(), StatusCode::OK);
    assert_eq!(scheduler.pending("alive-worker-1"), 1);

    coordinator.on_shutdown().await;

    // The listener is gone, not just unhealthy.
    assert!(reqwest::get(format!("http://{}/", addr)).await.is_err());
    assert!(!mock.contains_key("registered-test::worker-1"));
    assert_eq!(scheduler.pending("alive-worker-1"), 0);
}

#[tokio::test]
async fn quiet_keeps_the_probe_answering() {
    let mock = MockRedisClient::new();
    let mut coordinator = LifecycleCoordinator::new(
        test_config("worker-1"),
        Arc::new(mock.clone()),
        Arc::new(MemoryScheduler::new()),
        None,
    );

    coordinator.on_startup().await.unwrap();
    let addr = coordinator.probe_addr().unwrap();

    coordinator.on_quiet().await;

    // No longer registered, but still alive while draining.
    assert!(!mock.contains_key("registered-test::worker-1"));
    assert_eq!(probe(addr).await.status(), StatusCode::OK);

    coordinator.on_shutdown().await;
}
