use async_trait::async_trait;

use crate::{BusError, BusMessage};

/// Publishes a message to `topic`, awaiting broker acknowledgement. A
/// successful return means the message durably reached the bus
/// (`spec.md` §4.2 step 4: "await broker acknowledgement per record").
#[async_trait]
pub trait BusProducer: Send + Sync {
    async fn send(&self, topic: &str, message: BusMessage) -> Result<(), BusError>;
}
