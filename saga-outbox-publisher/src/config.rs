use std::time::Duration;

use saga_core::config::{csv_list_or, duration_ms_or, duration_secs_or, var_or};

/// Configuration for [`crate::OutboxPublisher`] (`spec.md` §6 `outbox.*`
/// keys).
#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    /// Delay between control-loop ticks.
    pub poll_interval: Duration,
    /// Max rows claimed per tenant per tick.
    pub batch_size: i64,
    /// Lease held on claimed rows.
    pub lease_duration: Duration,
    /// Initial retry delay.
    pub base_backoff: Duration,
    /// Retry delay cap.
    pub max_backoff: Duration,
    /// Parallelism across tenants.
    pub max_concurrent_tenants: usize,
    /// Bus topic domain events are published to.
    pub events_topic: String,
    /// Static tenant list override; when non-empty, bypasses
    /// `discover_tenants` entirely (`spec.md` §4.2 tenant discovery).
    pub static_tenants: Vec<String>,
}

impl OutboxPublisherConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval: duration_ms_or("OUTBOX_POLL_INTERVAL_MS", Duration::from_millis(500)),
            batch_size: var_or("OUTBOX_BATCH_SIZE", 100),
            lease_duration: duration_secs_or("OUTBOX_LEASE_DURATION_SECS", Duration::from_secs(30)),
            base_backoff: duration_secs_or("OUTBOX_BASE_BACKOFF_SECS", Duration::from_secs(5)),
            max_backoff: duration_secs_or("OUTBOX_MAX_BACKOFF_SECS", Duration::from_secs(120)),
            max_concurrent_tenants: var_or("OUTBOX_MAX_CONCURRENT_TENANTS", 8),
            events_topic: var_or("OUTBOX_EVENTS_TOPIC", "saga.events".to_string()),
            static_tenants: csv_list_or("OUTBOX_STATIC_TENANTS", Vec::new()),
        }
    }
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
