use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::LifecycleError;
use crate::heartbeat::HeartbeatRecorder;
use crate::liveness::LivenessChecker;
use crate::redis::Client;
use crate::registry::InstanceRegistry;
use crate::router;
use crate::scheduler::JobScheduler;
use crate::server;

// Bounded wait for the probe task to drain on shutdown.
const PROBE_SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

pub type ShutdownCallback = Arc<dyn Fn() + Send + Sync>;

struct ProbeHandle {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), std::io::Error>>,
}

/// Drives the three lifecycle transitions of the host worker process:
/// startup, quiet (drain) and shutdown. The host integration layer decides
/// when each hook fires; this coordinator only owns what happens inside
/// them.
pub struct LifecycleCoordinator {
    config: Config,
    heartbeat: HeartbeatRecorder,
    registry: InstanceRegistry,
    liveness: LivenessChecker,
    scheduler: Arc<dyn JobScheduler + Send + Sync>,
    shutdown_callback: Option<ShutdownCallback>,
    probe: Option<ProbeHandle>,
}

impl LifecycleCoordinator {
    pub fn new(
        config: Config,
        redis: Arc<dyn Client + Send + Sync>,
        scheduler: Arc<dyn JobScheduler + Send + Sync>,
        shutdown_callback: Option<ShutdownCallback>,
    ) -> Self {
        Self {
            heartbeat: HeartbeatRecorder::new(&config, redis.clone()),
            registry: InstanceRegistry::new(&config, redis.clone()),
            liveness: LivenessChecker::new(&config, redis),
            config,
            scheduler,
            shutdown_callback,
            probe: None,
        }
    }

    /// A handle for whatever drives the recurring heartbeat ticks.
    pub fn heartbeat(&self) -> HeartbeatRecorder {
        self.heartbeat.clone()
    }

    /// Address the probe listener is bound to, once startup has run.
    pub fn probe_addr(&self) -> Option<SocketAddr> {
        self.probe.as_ref().map(|probe| probe.addr)
    }

    /// Startup: install the instance queue ahead of all others, register,
    /// record a first heartbeat so the instance is visible as alive before
    /// the first scheduled tick, enqueue the recurring job, and bring up the
    /// probe listener. Every failure on this path is fatal; a worker whose
    /// health signal cannot come up must not start.
    pub async fn on_startup(&mut self) -> Result<(), LifecycleError> {
        let queue = self.config.queue_name();
        self.scheduler.install_queue(&queue).await?;

        tracing::info!(
            hostname = %self.config.hostname,
            port = self.config.port,
            ttl = self.config.time_to_live,
            queue = %queue,
            liveness_key = %self.config.liveness_key(),
            registration_key = %self.config.registration_key(),
            "starting worker-alive"
        );

        self.registry.register().await?;
        self.heartbeat.refresh().await?;
        self.scheduler.enqueue(&queue, &self.config.hostname).await?;

        // The probe runs in its own task so a crash or hang in the HTTP
        // layer cannot corrupt the worker; the two only meet through the
        // shared store.
        let listener = TcpListener::bind(self.config.bind()).await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel();
        let app = router::router(self.liveness.clone(), self.config.export_prometheus);
        let task = tokio::spawn(server::serve(listener, app, async move {
            let _ = stopped.await;
        }));
        self.probe = Some(ProbeHandle { addr, stop, task });

        let instances = self.registry.list_registered().await?;
        tracing::info!(
            registered_instances = ?instances,
            "successfully started worker-alive"
        );

        Ok(())
    }

    /// Quiet: the worker stops accepting new work but keeps running, so the
    /// probe stays up and pending heartbeat jobs are left alone; only the
    /// registration is withdrawn.
    pub async fn on_quiet(&mut self) {
        tracing::info!(hostname = %self.config.hostname, "quieting worker-alive");

        if let Err(err) = self.registry.unregister().await {
            tracing::error!("failed to unregister instance on quiet: {}", err);
        }

        self.run_shutdown_callback();
    }

    /// Shutdown: stop the probe listener and wait for it, then purge pending
    /// heartbeat jobs and unregister. Purge and unregister are independent
    /// best-effort steps, not a transaction: either may fail without
    /// preventing the other, and no failure here stops the process from
    /// terminating.
    pub async fn on_shutdown(&mut self) {
        tracing::info!(hostname = %self.config.hostname, "shutting down worker-alive");

        self.stop_probe().await;
        self.purge_pending_jobs().await;

        if let Err(err) = self.registry.unregister().await {
            tracing::error!("failed to unregister instance on shutdown: {}", err);
        }

        self.run_shutdown_callback();
    }

    async fn stop_probe(&mut self) {
        let Some(probe) = self.probe.take() else {
            return;
        };

        let _ = probe.stop.send(());
        match tokio::time::timeout(PROBE_SHUTDOWN_WAIT, probe.task).await {
            Ok(Ok(Ok(()))) => tracing::info!("probe listener stopped"),
            Ok(Ok(Err(err))) => tracing::error!("probe listener exited with an error: {}", err),
            Ok(Err(err)) => tracing::error!("probe listener task failed: {}", err),
            Err(_) => tracing::error!("probe listener did not stop in time"),
        }
    }

    async fn purge_pending_jobs(&self) {
        let queue = self.config.queue_name();
        match self.scheduler.purge_queue(&queue).await {
            Ok(stats) => tracing::info!(
                queue = %queue,
                purged = stats.purged_jobs,
                "purged pending heartbeat jobs"
            ),
            Err(err) => tracing::error!("failed to purge pending heartbeat jobs: {}", err),
        }
    }

    fn run_shutdown_callback(&self) {
        if let Some(callback) = &self.shutdown_callback {
            callback();
        }
    }
}
