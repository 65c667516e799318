//! rdkafka-backed implementations of the transport contracts
//!
//! Clients are created lazily on `connect()` and verified with a metadata
//! probe, so connection failures surface where the state machines expect
//! them instead of on first use.

use crate::typestream::event::Topic;
use crate::typestream::kafka::config::{KafkaConsumerConfig, KafkaProducerConfig};
use crate::typestream::kafka::transport::{
    ConsumerTransport, MessageHandler, ProducerTransport, TopicMessages, TransportError,
    WireHeaders, WireMessage, CORRELATION_ID_HEADER, SCHEMA_HEADER,
};
use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

fn is_connection_code(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::Resolve
    )
}

/// Split broker failures into the connection class (reconnect first) and
/// everything else (retry in place).
pub(crate) fn classify_kafka_error(error: KafkaError) -> TransportError {
    let connection = match &error {
        KafkaError::ClientCreation(_) | KafkaError::MetadataFetch(_) => true,
        KafkaError::Global(code)
        | KafkaError::MessageConsumption(code)
        | KafkaError::MessageProduction(code) => is_connection_code(*code),
        _ => false,
    };
    if connection {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

/// Consumer transport over an rdkafka `StreamConsumer`.
pub struct KafkaConsumerTransport {
    config: KafkaConsumerConfig,
    consumer: Mutex<Option<Arc<StreamConsumer>>>,
    from_beginning: AtomicBool,
    closed: AtomicBool,
    shutdown: Notify,
}

impl KafkaConsumerTransport {
    pub fn new(config: KafkaConsumerConfig) -> Self {
        KafkaConsumerTransport {
            config,
            consumer: Mutex::new(None),
            from_beginning: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    fn create_consumer(&self, from_beginning: bool) -> Result<Arc<StreamConsumer>, TransportError> {
        let consumer: StreamConsumer = self
            .config
            .to_client_config(from_beginning)
            .create()
            .map_err(classify_kafka_error)?;
        Ok(Arc::new(consumer))
    }

    async fn probe_cluster(&self, consumer: &Arc<StreamConsumer>) -> Result<(), TransportError> {
        let probe = Arc::clone(consumer);
        let timeout = self.config.common.request_timeout;
        tokio::task::spawn_blocking(move || probe.fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
            .map_err(classify_kafka_error)?;
        Ok(())
    }
}

#[async_trait]
impl ConsumerTransport for KafkaConsumerTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let consumer = self.create_consumer(self.from_beginning.load(Ordering::SeqCst))?;
        self.probe_cluster(&consumer).await?;
        self.closed.store(false, Ordering::SeqCst);
        *self.consumer.lock().expect("consumer slot lock poisoned") = Some(consumer);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let consumer = self
            .consumer
            .lock()
            .expect("consumer slot lock poisoned")
            .take();
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        if let Some(consumer) = consumer {
            consumer.unsubscribe();
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topics: &[Topic],
        from_beginning: bool,
    ) -> Result<(), TransportError> {
        // The read position is fixed when the client is created; rebuild it
        // if the requested position differs from the connected one.
        if self.from_beginning.swap(from_beginning, Ordering::SeqCst) != from_beginning {
            let consumer = self.create_consumer(from_beginning)?;
            *self.consumer.lock().expect("consumer slot lock poisoned") = Some(consumer);
        }
        let consumer = self
            .consumer
            .lock()
            .expect("consumer slot lock poisoned")
            .clone()
            .ok_or_else(|| TransportError::Other("consumer is not connected".to_string()))?;
        let names: Vec<&str> = topics.iter().map(Topic::as_str).collect();
        consumer.subscribe(&names).map_err(classify_kafka_error)
    }

    async fn run(&self, handler: MessageHandler) -> Result<(), TransportError> {
        let consumer = self
            .consumer
            .lock()
            .expect("consumer slot lock poisoned")
            .clone()
            .ok_or_else(|| TransportError::Other("consumer is not connected".to_string()))?;
        loop {
            let shutdown = self.shutdown.notified();
            if self.closed.load(Ordering::SeqCst) {
                return Ok(());
            }
            tokio::select! {
                _ = shutdown => return Ok(()),
                received = consumer.recv() => {
                    // The borrowed message is copied out before awaiting the
                    // handler so the loop future stays Send
                    let (topic, wire) = match received {
                        Ok(message) => {
                            (Topic::from(message.topic()), wire_message_from(&message))
                        }
                        Err(error) => return Err(classify_kafka_error(error)),
                    };
                    handler(topic, wire).await?;
                }
            }
        }
    }
}

fn wire_message_from(message: &BorrowedMessage<'_>) -> WireMessage {
    let mut headers = WireHeaders::default();
    if let Some(borrowed) = message.headers() {
        for i in 0..borrowed.count() {
            let header = borrowed.get(i);
            match header.key {
                SCHEMA_HEADER => headers.schema = header.value.map(|v| v.to_vec()),
                CORRELATION_ID_HEADER => {
                    headers.correlation_id = header.value.map(|v| v.to_vec())
                }
                _ => {}
            }
        }
    }
    WireMessage {
        key: message.key().map(|k| k.to_vec()),
        value: message.payload().map(|p| p.to_vec()),
        headers,
    }
}

/// Producer transport over an rdkafka `FutureProducer`.
pub struct KafkaProducerTransport {
    config: KafkaProducerConfig,
    producer: Mutex<Option<FutureProducer>>,
}

impl KafkaProducerTransport {
    pub fn new(config: KafkaProducerConfig) -> Self {
        KafkaProducerTransport {
            config,
            producer: Mutex::new(None),
        }
    }

    fn delivery_timeout(&self) -> Duration {
        self.config.common.request_timeout
    }
}

#[async_trait]
impl ProducerTransport for KafkaProducerTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let producer: FutureProducer = self
            .config
            .to_client_config()
            .create()
            .map_err(classify_kafka_error)?;

        let probe = producer.clone();
        let timeout = self.delivery_timeout();
        tokio::task::spawn_blocking(move || probe.client().fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
            .map_err(classify_kafka_error)?;

        *self.producer.lock().expect("producer slot lock poisoned") = Some(producer);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.producer
            .lock()
            .expect("producer slot lock poisoned")
            .take();
        Ok(())
    }

    async fn send_batch(&self, batches: Vec<TopicMessages>) -> Result<(), TransportError> {
        let producer = self
            .producer
            .lock()
            .expect("producer slot lock poisoned")
            .clone()
            .ok_or_else(|| {
                TransportError::Connection("producer is not connected".to_string())
            })?;

        for batch in &batches {
            for record in &batch.messages {
                let mut headers = OwnedHeaders::new();
                if let Some(schema) = &record.headers.schema {
                    headers = headers.insert(Header {
                        key: SCHEMA_HEADER,
                        value: Some(schema.as_str()),
                    });
                }
                if let Some(correlation_id) = &record.headers.correlation_id {
                    headers = headers.insert(Header {
                        key: CORRELATION_ID_HEADER,
                        value: Some(correlation_id.as_str()),
                    });
                }
                let mut future_record = FutureRecord::<str, [u8]>::to(batch.topic.as_str())
                    .payload(record.value.as_slice())
                    .headers(headers);
                if let Some(key) = &record.key {
                    future_record = future_record.key(key.as_str());
                }
                producer
                    .send(future_record, self.delivery_timeout())
                    .await
                    .map_err(|(error, _)| classify_kafka_error(error))?;
            }
        }
        Ok(())
    }
}
