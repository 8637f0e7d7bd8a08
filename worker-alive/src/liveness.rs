use std::sync::Arc;

use crate::config::Config;
use crate::redis::{Client, CustomRedisError, TTL_KEY_MISSING};

/// Answers "is this instance alive" from the TTL state of its liveness key.
///
/// The TTL lookup distinguishes three states: key missing, key present with
/// no expiry, and key present with time remaining. Only the first means the
/// instance is dead; the probe endpoint calls this on every request, so it is
/// a single read and never writes to the store.
#[derive(Clone)]
pub struct LivenessChecker {
    redis: Arc<dyn Client + Send + Sync>,
    liveness_key: String,
}

impl LivenessChecker {
    pub fn new(config: &Config, redis: Arc<dyn Client + Send + Sync>) -> Self {
        Self {
            redis,
            liveness_key: config.liveness_key(),
        }
    }

    pub async fn is_alive(&self) -> Result<bool, CustomRedisError> {
        let ttl = self.redis.ttl(self.liveness_key.clone()).await?;
        Ok(ttl != TTL_KEY_MISSING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatRecorder;
    use crate::mock::MockRedisClient;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            redis_url: "redis://localhost:6379/".to_string(),
            hostname: "worker-1".to_string(),
            liveness_key_prefix: "alive-test".to_string(),
            registered_instance_key_prefix: "registered-test".to_string(),
            queue_prefix: "alive".to_string(),
            time_to_live: 10,
            registration_ttl: 40,
            disabled: false,
            export_prometheus: false,
        }
    }

    #[tokio::test]
    async fn missing_key_means_not_alive() {
        let checker = LivenessChecker::new(&test_config(), Arc::new(MockRedisClient::new()));
        assert!(!checker.is_alive().await.unwrap());
    }

    #[tokio::test]
    async fn alive_immediately_after_a_refresh() {
        let mock = MockRedisClient::new();
        let config = test_config();
        let checker = LivenessChecker::new(&config, Arc::new(mock.clone()));
        let recorder = HeartbeatRecorder::new(&config, Arc::new(mock));

        recorder.refresh().await.unwrap();
        assert!(checker.is_alive().await.unwrap());
    }

    #[tokio::test]
    async fn not_alive_once_the_ttl_elapses_without_a_refresh() {
        let mock = MockRedisClient::new();
        let config = test_config();
        let checker = LivenessChecker::new(&config, Arc::new(mock.clone()));
        let recorder = HeartbeatRecorder::new(&config, Arc::new(mock.clone()));

        recorder.refresh().await.unwrap();
        mock.advance_clock(11);

        assert!(!checker.is_alive().await.unwrap());
    }

    #[tokio::test]
    async fn a_key_without_expiry_still_counts_as_alive() {
        // "exists with no TTL" and "exists with a TTL" both map to alive;
        // only the missing-key sentinel means dead.
        let mock = MockRedisClient::new();
        let checker = LivenessChecker::new(&test_config(), Arc::new(mock.clone()));

        mock.insert_persistent("alive-test::worker-1", "1");
        assert!(checker.is_alive().await.unwrap());
    }

    #[tokio::test]
    async fn store_errors_surface_instead_of_guessing() {
        let mock = MockRedisClient::new().ttl_err(CustomRedisError::Timeout);
        let checker = LivenessChecker::new(&test_config(), Arc::new(mock));

        assert!(checker.is_alive().await.is_err());
    }
}
