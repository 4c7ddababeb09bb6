//! Global `tracing` setup, grounded on the source's `logger` crate
//! (`EnvFilter` defaulting to INFO, switched to JSON output when
//! `LOG_FORMAT=json` per `spec.md` §2's ambient-stack "Logging" line).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_format {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_ansi(true)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    }
}
