use async_trait::async_trait;

use crate::{BusError, BusMessage};

/// A message delivered to a consumer, tagged with its source partition and
/// offset so the projector can commit only after its terminal stage
/// (`spec.md` §4.3: "records from the same partition are processed
/// sequentially"; §6: "Consumers acknowledge offsets only after the
/// projector's terminal stage").
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: BusMessage,
    pub partition: i32,
    pub offset: i64,
}

/// A single-partition-at-a-time stream of bus messages. Implementations are
/// free to interleave delivery across partitions internally, but a given
/// partition's messages MUST be handed to the caller in offset order.
#[async_trait]
pub trait BusConsumer: Send {
    /// Waits for and returns the next message, or `Ok(None)` if the
    /// consumer has been closed.
    async fn recv(&mut self) -> Result<Option<IncomingMessage>, BusError>;

    /// Commits the given offset for the given partition as processed.
    async fn commit(&mut self, partition: i32, offset: i64) -> Result<(), BusError>;
}
