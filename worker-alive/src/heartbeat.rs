use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;

use crate::config::Config;
use crate::redis::{Client, CustomRedisError};

/// Periodically proves this instance is alive by rewriting its liveness key
/// with a fresh timestamp and TTL.
#[derive(Clone)]
pub struct HeartbeatRecorder {
    redis: Arc<dyn Client + Send + Sync>,
    liveness_key: String,
    time_to_live: u64,
}

impl HeartbeatRecorder {
    pub fn new(config: &Config, redis: Arc<dyn Client + Send + Sync>) -> Self {
        Self {
            redis,
            liveness_key: config.liveness_key(),
            time_to_live: config.time_to_live,
        }
    }

    /// Write the liveness key with the current timestamp and the configured
    /// TTL. Idempotent: every call simply extends the expiry window. Store
    /// failures propagate so the scheduling layer can decide whether to
    /// retry; this component never swallows them.
    pub async fn refresh(&self) -> Result<(), CustomRedisError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.redis
            .setex(self.liveness_key.clone(), now.to_string(), self.time_to_live)
            .await?;

        counter!("worker_alive_heartbeats_total").increment(1);
        tracing::debug!(key = %self.liveness_key, ttl = self.time_to_live, "heartbeat refreshed");

        Ok(())
    }
}
