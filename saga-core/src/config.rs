//! Small env-var config loading helpers, grounded on the source's
//! `common::env`/`dotenv` conventions: read from the process environment
//! with a documented default, log nothing sensitive, and never panic on a
//! missing key.
//!
//! Every config struct in this workspace (`OutboxPublisherConfig`,
//! `LiveBusConfig`, `GatewayConfig`, ...) is built with these helpers so
//! `spec.md` §6's configuration table has one loading convention throughout.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Reads `key` from the environment and parses it, falling back to
/// `default` if the key is unset or fails to parse. A parse failure is
/// logged at `warn` rather than treated as fatal, matching the source's
/// "reject unknown keys loudly in tests, leniently in production" design
/// note (`spec.md` §9).
pub fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "failed to parse env var, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Like [`var_or`] but for durations expressed in whole milliseconds.
pub fn duration_ms_or(key: &str, default: Duration) -> Duration {
    Duration::from_millis(var_or(key, default.as_millis() as u64))
}

/// Like [`var_or`] but for durations expressed in whole seconds.
pub fn duration_secs_or(key: &str, default: Duration) -> Duration {
    Duration::from_secs(var_or(key, default.as_secs()))
}

/// Reads a required env var, returning an error with the key name if unset.
/// Used for things without a sane default (e.g. `DATABASE_URL`).
pub fn required_var(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("missing required env var {key}"))
}

/// Loads a comma-separated list, trimming whitespace and dropping empty
/// entries. Used for `outbox.tenants` static-list override (`spec.md` §4.2
/// "Tenant discovery: if a static list is configured, use it").
pub fn csv_list_or(key: &str, default: Vec<String>) -> Vec<String> {
    match env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_or_falls_back_on_missing_key() {
        assert_eq!(var_or::<u64>("SAGA_CORE_TEST_DOES_NOT_EXIST", 42), 42);
    }

    #[test]
    fn csv_list_trims_and_drops_empty() {
        unsafe {
            env::set_var("SAGA_CORE_TEST_CSV", " a, b ,, c");
        }
        assert_eq!(
            csv_list_or("SAGA_CORE_TEST_CSV", vec![]),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        unsafe {
            env::remove_var("SAGA_CORE_TEST_CSV");
        }
    }
}
