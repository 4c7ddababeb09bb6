use std::time::Duration;

use saga_core::config::{duration_secs_or, var_or};
use saga_live::LiveStatusBusConfig;
use saga_outbox_publisher::OutboxPublisherConfig;

/// Every row of `spec.md` §6's configuration table that isn't already
/// owned by a downstream crate's own `Config` struct (`OutboxPublisherConfig`,
/// `LiveStatusBusConfig`).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub bus_brokers: String,
    pub bus_group_id: String,
    pub outbox: OutboxPublisherConfig,
    pub live: LiveStatusBusConfig,
    pub provider_read_timeout: Duration,
    pub webhook_secret: String,
}

impl GatewayConfig {
    pub fn from_env(bind_addr: String, database_url: String, bus_brokers: String) -> Self {
        Self {
            bind_addr,
            database_url,
            bus_brokers,
            bus_group_id: var_or("BUS_GROUP_ID", "saga-gateway".to_string()),
            outbox: OutboxPublisherConfig::from_env(),
            live: LiveStatusBusConfig {
                idle_ttl: duration_secs_or("LIVE_IDLE_TTL_SECS", Duration::from_secs(15 * 60)),
                sweep_interval: duration_secs_or("LIVE_EVICTION_INTERVAL_SECS", Duration::from_secs(5 * 60)),
            },
            provider_read_timeout: duration_secs_or("PROVIDER_TIMEOUT_READ_SECS", Duration::from_secs(10)),
            webhook_secret: var_or("WEBHOOK_SECRET", String::new()),
        }
    }
}
