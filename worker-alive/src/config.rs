use envconfig::Envconfig;

/// Process-wide configuration, read from the environment once at startup and
/// treated as read-only afterwards. Malformed values (a non-numeric TTL, an
/// out-of-range port) fail `init_from_env` immediately instead of being
/// silently defaulted.
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    /// Port the liveness probe listens on.
    #[envconfig(from = "WORKER_ALIVE_PORT", default = "7433")]
    pub port: u16,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    /// Instance identity for the lifetime of the process. Falls back to the
    /// `HOSTNAME_NOT_SET` sentinel when the environment does not provide one.
    #[envconfig(from = "HOSTNAME", default = "HOSTNAME_NOT_SET")]
    pub hostname: String,

    #[envconfig(
        from = "WORKER_ALIVE_LIVENESS_KEY_PREFIX",
        default = "WORKER_ALIVE::LIVENESS"
    )]
    pub liveness_key_prefix: String,

    #[envconfig(
        from = "WORKER_ALIVE_REGISTERED_KEY_PREFIX",
        default = "WORKER_ALIVE::REGISTERED"
    )]
    pub registered_instance_key_prefix: String,

    #[envconfig(from = "WORKER_ALIVE_QUEUE_PREFIX", default = "worker-alive")]
    pub queue_prefix: String,

    /// Heartbeat TTL in seconds. The instance reads as dead once this window
    /// elapses without a refresh.
    #[envconfig(from = "WORKER_ALIVE_TTL", default = "600")]
    pub time_to_live: u64,

    /// Registration TTL in seconds. Deliberately longer than the heartbeat
    /// TTL: registration answers "has this instance started", not "is it
    /// currently healthy", and is only refreshed at startup.
    #[envconfig(from = "WORKER_ALIVE_REGISTRATION_TTL", default = "2400")]
    pub registration_ttl: u64,

    /// Kill switch for local and dev runs.
    #[envconfig(from = "WORKER_ALIVE_DISABLED", default = "false")]
    pub disabled: bool,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Produce a host:port address for binding the probe listener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Key holding the timestamp of this instance's last heartbeat.
    pub fn liveness_key(&self) -> String {
        format!("{}::{}", self.liveness_key_prefix, self.hostname)
    }

    /// Key marking this instance as started and not yet cleanly shut down.
    pub fn registration_key(&self) -> String {
        format!("{}::{}", self.registered_instance_key_prefix, self.hostname)
    }

    /// Dedicated queue carrying this instance's recurring heartbeat job.
    pub fn queue_name(&self) -> String {
        format!("{}-{}", self.queue_prefix, self.hostname)
    }
}
