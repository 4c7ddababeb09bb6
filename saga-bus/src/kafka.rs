use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::TopicPartitionList;

use crate::{BusConsumer, BusError, BusMessage, BusProducer, IncomingMessage};

/// Publish timeout per record; matches `spec.md` §4.2 step 4 ("await broker
/// acknowledgement per record"). The underlying `FutureProducer` MUST be
/// configured with `enable.idempotence = true` so retried sends can't
/// duplicate a record on the broker side.
const SEND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct KafkaBusProducer {
    producer: FutureProducer,
}

impl KafkaBusProducer {
    pub fn new(producer: FutureProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl BusProducer for KafkaBusProducer {
    async fn send(&self, topic: &str, message: BusMessage) -> Result<(), BusError> {
        let mut headers = OwnedHeaders::new();
        for (key, value) in &message.headers {
            headers = headers.insert(Header {
                key,
                value: Some(value.as_bytes()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(&message.key)
            .payload(&message.payload)
            .headers(headers);

        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _)| BusError::Transport(anyhow::anyhow!(err)))?;

        Ok(())
    }
}

pub struct KafkaBusConsumer {
    consumer: StreamConsumer,
}

impl KafkaBusConsumer {
    pub fn new(consumer: StreamConsumer) -> Self {
        Self { consumer }
    }
}

#[async_trait]
impl BusConsumer for KafkaBusConsumer {
    async fn recv(&mut self) -> Result<Option<IncomingMessage>, BusError> {
        let borrowed = self
            .consumer
            .recv()
            .await
            .map_err(|e| BusError::Transport(anyhow::anyhow!(e)))?;

        let key = borrowed
            .key()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        let payload = borrowed.payload().unwrap_or_default().to_vec();

        let mut headers = std::collections::BTreeMap::new();
        if let Some(kafka_headers) = borrowed.headers() {
            for i in 0..kafka_headers.count() {
                let header = kafka_headers.get(i);
                if let Some(value) = header.value {
                    headers.insert(
                        header.key.to_string(),
                        String::from_utf8_lossy(value).into_owned(),
                    );
                }
            }
        }

        Ok(Some(IncomingMessage {
            message: BusMessage {
                key,
                payload,
                headers,
            },
            partition: borrowed.partition(),
            offset: borrowed.offset(),
        }))
    }

    async fn commit(&mut self, partition: i32, offset: i64) -> Result<(), BusError> {
        let mut tpl = TopicPartitionList::new();
        for subscription in self.consumer.assignment().map_err(|e| BusError::Transport(anyhow::anyhow!(e)))?.elements() {
            if subscription.partition() == partition {
                tpl.add_partition_offset(
                    subscription.topic(),
                    partition,
                    rdkafka::Offset::Offset(offset + 1),
                )
                .map_err(|e| BusError::Transport(anyhow::anyhow!(e)))?;
            }
        }
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| BusError::Transport(anyhow::anyhow!(e)))?;
        Ok(())
    }
}
