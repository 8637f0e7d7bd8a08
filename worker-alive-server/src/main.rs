//! Run the liveness-heartbeat sidecar as a standalone worker process.
use std::sync::Arc;
use std::time::Duration;

use envconfig::Envconfig;
use tokio::signal;
use tokio::time::interval;

use worker_alive::config::Config;
use worker_alive::lifecycle::LifecycleCoordinator;
use worker_alive::redis::RedisClient;
use worker_alive::scheduler::MemoryScheduler;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("Invalid configuration:");

    if config.disabled {
        tracing::info!("worker-alive is disabled, exiting");
        return;
    }

    let redis = Arc::new(
        RedisClient::new(config.redis_url.clone()).expect("failed to create redis client"),
    );
    let scheduler = Arc::new(MemoryScheduler::new());

    let mut coordinator = LifecycleCoordinator::new(
        config.clone(),
        redis,
        scheduler,
        Some(Arc::new(|| tracing::info!("shutdown callback invoked"))),
    );

    coordinator
        .on_startup()
        .await
        .expect("failed to start worker-alive");

    // Refresh at half the TTL so a single missed tick never expires the key.
    let heartbeat = coordinator.heartbeat();
    let mut tick = interval(Duration::from_secs((config.time_to_live / 2).max(1)));
    // The first tick fires immediately and startup already refreshed.
    tick.tick().await;

    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    let mut int = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");
    let mut usr1 = signal::unix::signal(signal::unix::SignalKind::user_defined1())
        .expect("failed to register SIGUSR1 handler");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(err) = heartbeat.refresh().await {
                    // The next tick is the retry policy.
                    tracing::error!("heartbeat refresh failed: {}", err);
                }
            }
            _ = usr1.recv() => coordinator.on_quiet().await,
            _ = term.recv() => break,
            _ = int.recv() => break,
        }
    }

    coordinator.on_shutdown().await;
}
