//! The long-running worker that drains [`saga_outbox::OutboxStore`] rows to
//! the message bus (`spec.md` §4.2).

mod config;
mod publisher;

pub use config::OutboxPublisherConfig;
pub use publisher::OutboxPublisher;
