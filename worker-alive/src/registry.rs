use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::Config;
use crate::redis::{Client, CustomRedisError};

// Upper bound per SCAN page; the store is free to return fewer.
const SCAN_COUNT: usize = 1000;

/// Tracks which instances are currently active, one registration key per
/// instance under a shared prefix. Registration is written once at startup
/// and carries its own TTL as a safety net against unclean termination.
pub struct InstanceRegistry {
    redis: Arc<dyn Client + Send + Sync>,
    registration_key: String,
    key_prefix: String,
    registration_ttl: u64,
}

impl InstanceRegistry {
    pub fn new(config: &Config, redis: Arc<dyn Client + Send + Sync>) -> Self {
        Self {
            redis,
            registration_key: config.registration_key(),
            key_prefix: config.registered_instance_key_prefix.clone(),
            registration_ttl: config.registration_ttl,
        }
    }

    /// Write this instance's registration key with the registration TTL.
    pub async fn register(&self) -> Result<(), CustomRedisError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.redis
            .setex(
                self.registration_key.clone(),
                now.to_string(),
                self.registration_ttl,
            )
            .await
    }

    /// Delete this instance's registration key. Deleting an already-absent
    /// key is a no-op, so calling this twice is safe.
    pub async fn unregister(&self) -> Result<(), CustomRedisError> {
        self.redis.del(self.registration_key.clone()).await
    }

    /// Enumerate every registered instance key, paging through the scan
    /// cursor until it wraps back to 0. A single page may be partial, so the
    /// result is the union across pages. Unordered.
    pub async fn list_registered(&self) -> Result<HashSet<String>, CustomRedisError> {
        let pattern = format!("{}::*", self.key_prefix);
        let mut keys = HashSet::new();
        let mut cursor = 0;

        loop {
            let (next_cursor, page) = self
                .redis
                .scan(cursor, pattern.clone(), SCAN_COUNT)
                .await?;
            keys.extend(page);

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRedisClient;

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

    #[tokio::test]
    async fn register_writes_the_key_with_the_registration_ttl() {
        let mock = MockRedisClient::new();
        let registry = InstanceRegistry::new(&test_config("worker-1"), Arc::new(mock.clone()));

        registry.register().await.unwrap();

        assert_eq!(
            mock.ttl("registered-test::worker-1".to_string())
                .await
                .unwrap(),
            40
        );
    }

    #[tokio::test]
    async fn unregister_removes_the_key_and_is_idempotent() {
        let mock = MockRedisClient::new();
        let registry = InstanceRegistry::new(&test_config("worker-1"), Arc::new(mock.clone()));

        registry.register().await.unwrap();
        registry.unregister().await.unwrap();
        assert!(!mock.contains_key("registered-test::worker-1"));

        // Second unregister is a no-op, not an error.
        registry.unregister().await.unwrap();
    }

    #[tokio::test]
    async fn list_registered_unions_all_pages_and_terminates() {
        let mock = MockRedisClient::new().scan_page_size(1);
        let registry = InstanceRegistry::new(&test_config("worker-1"), Arc::new(mock.clone()));

        for hostname in ["worker-1", "worker-2", "worker-3"] {
            InstanceRegistry::new(&test_config(hostname), Arc::new(mock.clone()))
                .register()
                .await
                .unwrap();
        }
        // A key outside the registration namespace must not be picked up.
        mock.setex("alive-test::worker-1".to_string(), "1".to_string(), 60)
            .await
            .unwrap();

        let registered = registry.list_registered().await.unwrap();

        assert_eq!(registered.len(), 3);
        assert!(registered.contains("registered-test::worker-2"));
    }

    #[tokio::test]
    async fn unregistered_instances_never_appear_in_the_next_scan() {
        let mock = MockRedisClient::new();
        let registry_one = InstanceRegistry::new(&test_config("worker-1"), Arc::new(mock.clone()));
        let registry_two = InstanceRegistry::new(&test_config("worker-2"), Arc::new(mock.clone()));

        registry_one.register().await.unwrap();
        registry_two.register().await.unwrap();
        registry_one.unregister().await.unwrap();

        let registered = registry_two.list_registered().await.unwrap();

        assert_eq!(
            registered,
            HashSet::from(["registered-test::worker-2".to_string()])
        );
    }
}
