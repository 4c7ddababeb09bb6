//! Message-bus plumbing: a wire-agnostic [`BusMessage`], the
//! [`BusProducer`]/[`BusConsumer`] traits participant services and the
//! outbox publisher/projector are written against, a JSON event codec with
//! the field-fallback rules `spec.md` §4.3 requires, and two adapters — a
//! Kafka-backed one for production and an in-memory one for tests.

mod codec;
mod consumer;
mod error;
mod kafka;
mod memory;
mod message;
mod producer;

pub use codec::{parse_tenant_map_literal, DecodedEvent, EventCodec};
pub use consumer::{BusConsumer, IncomingMessage};
pub use error::BusError;
pub use kafka::{KafkaBusConsumer, KafkaBusProducer};
pub use memory::InMemoryBus;
pub use message::BusMessage;
pub use producer::BusProducer;
