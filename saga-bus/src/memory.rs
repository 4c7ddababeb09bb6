use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{BusConsumer, BusError, BusMessage, BusProducer, IncomingMessage};

const CHANNEL_CAPACITY: usize = 1024;

struct Topic {
    sender: broadcast::Sender<IncomingMessage>,
    next_offset: i64,
}

/// An in-process bus for tests: single partition per topic, delivery order
/// matches publish order, no actual network I/O. `commit` is a no-op since
/// there's nothing durable to advance.
pub struct InMemoryBus {
    topics: Mutex<HashMap<String, Topic>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to `topic`, receiving only messages published after this
    /// call (matches a real consumer group joining fresh, since this bus
    /// has no persistence to replay from).
    pub fn subscribe(&self, topic: &str) -> InMemoryBusConsumer {
        let mut topics = self.topics.lock().unwrap();
        let entry = topics.entry(topic.to_string()).or_insert_with(|| Topic {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
            next_offset: 0,
        });
        InMemoryBusConsumer {
            receiver: entry.sender.subscribe(),
        }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusProducer for InMemoryBus {
    async fn send(&self, topic: &str, message: BusMessage) -> Result<(), BusError> {
        let mut topics = self.topics.lock().unwrap();
        let entry = topics.entry(topic.to_string()).or_insert_with(|| Topic {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
            next_offset: 0,
        });
        let offset = entry.next_offset;
        entry.next_offset += 1;
        // No subscribers yet is not an error: matches a real broker, where
        // publishing ahead of any consumer group is normal.
        let _ = entry.sender.send(IncomingMessage {
            message,
            partition: 0,
            offset,
        });
        Ok(())
    }
}

pub struct InMemoryBusConsumer {
    receiver: broadcast::Receiver<IncomingMessage>,
}

#[async_trait]
impl BusConsumer for InMemoryBusConsumer {
    async fn recv(&mut self) -> Result<Option<IncomingMessage>, BusError> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Ok(Some(message)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn commit(&mut self, _partition: i32, _offset: i64) -> Result<(), BusError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_messages_in_publish_order() {
        let bus = InMemoryBus::new();
        let mut consumer = bus.subscribe("saga.events");

        bus.send("saga.events", BusMessage::new("k1", b"one".to_vec()))
            .await
            .unwrap();
        bus.send("saga.events", BusMessage::new("k2", b"two".to_vec()))
            .await
            .unwrap();

        let first = consumer.recv().await.unwrap().unwrap();
        let second = consumer.recv().await.unwrap().unwrap();
        assert_eq!(first.message.payload, b"one");
        assert_eq!(second.message.payload, b"two");
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
    }
}
