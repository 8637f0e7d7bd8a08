pub mod config;
pub mod error;
pub mod heartbeat;
pub mod lifecycle;
pub mod liveness;
pub mod metrics;
pub mod mock;
pub mod redis;
pub mod registry;
pub mod router;
pub mod scheduler;
pub mod server;
