//! Shared fixtures for the integration tests: simple schema families,
//! a recording processor, and scriptable in-process transports.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use typestream::{
    ConsumerTransport, EventStreamError, EventStreamProcessor, MessageHandler, ProducerTransport,
    Schema, SchemaDeserializer, SchemaError, Topic, TopicEvent, TopicMessages, TransportError,
    WireHeaders, WireMessage,
};

/// Fixed-width little-endian u32 schema; transforms into [`TextSchema`].
pub struct NumberSchema {
    name: String,
}

impl NumberSchema {
    pub fn new(name: impl Into<String>) -> Arc<dyn Schema> {
        Arc::new(NumberSchema { name: name.into() })
    }
}

impl Schema for NumberSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        value.as_u64().map_or(false, |n| n <= u32::MAX as u64)
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        let number = value
            .as_u64()
            .filter(|n| *n <= u32::MAX as u64)
            .ok_or_else(|| SchemaError::Serialization(format!("not a u32: {}", value)))?;
        Ok((number as u32).to_le_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(Value::from(u32::from_le_bytes(bytes)))
    }

    fn transform_to(&self, reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        if reader.as_any().is::<TextSchema>() {
            Some(Box::new(NumberToText))
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct NumberToText;

impl SchemaDeserializer for NumberToText {
    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(Value::from(u32::from_le_bytes(bytes).to_string()))
    }
}

/// UTF-8 text schema.
pub struct TextSchema {
    name: String,
}

impl TextSchema {
    pub fn new(name: impl Into<String>) -> Arc<dyn Schema> {
        Arc::new(TextSchema { name: name.into() })
    }
}

impl Schema for TextSchema {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn validate(&self, value: &Value) -> bool {
        value.is_string()
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SchemaError> {
        let text = value
            .as_str()
            .ok_or_else(|| SchemaError::Serialization(format!("not a string: {}", value)))?;
        Ok(text.as_bytes().to_vec())
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<Value> {
        std::str::from_utf8(bytes).ok().map(Value::from)
    }

    fn transform_to(&self, _reader: &dyn Schema) -> Option<Box<dyn SchemaDeserializer>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Collects every event it processes.
pub struct RecordingProcessor {
    events: Mutex<Vec<TopicEvent<Value>>>,
}

impl RecordingProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingProcessor {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn values(&self) -> Vec<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.data.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<TopicEvent<Value>> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStreamProcessor for RecordingProcessor {
    async fn process(&self, event: TopicEvent<Value>) -> Result<(), EventStreamError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// In-process consumer transport with scriptable failures and a message
/// feed driven by the test.
pub struct MockConsumerTransport {
    connect_results: Mutex<VecDeque<Result<(), TransportError>>>,
    subscribe_results: Mutex<VecDeque<Result<(), TransportError>>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub runs: AtomicUsize,
    pub subscriptions: Mutex<Vec<(Vec<Topic>, bool)>>,
    messages: Mutex<VecDeque<(Topic, WireMessage)>>,
    closed: AtomicBool,
    wake: Notify,
}

impl MockConsumerTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockConsumerTransport {
            connect_results: Mutex::new(VecDeque::new()),
            subscribe_results: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            subscriptions: Mutex::new(Vec::new()),
            messages: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(true),
            wake: Notify::new(),
        })
    }

    /// Queue outcomes for upcoming `connect` calls; unscripted calls
    /// succeed.
    pub fn script_connect(&self, results: Vec<Result<(), TransportError>>) {
        self.connect_results.lock().unwrap().extend(results);
    }

    pub fn script_subscribe(&self, results: Vec<Result<(), TransportError>>) {
        self.subscribe_results.lock().unwrap().extend(results);
    }

    /// Deliver a message to the running consumer.
    pub fn push_message(&self, topic: impl Into<Topic>, message: WireMessage) {
        self.messages.lock().unwrap().push_back((topic.into(), message));
        self.wake.notify_waiters();
    }
}

#[async_trait]
impl ConsumerTransport for MockConsumerTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let result = self
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.closed.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
        Ok(())
    }

    async fn subscribe(
        &self,
        topics: &[Topic],
        from_beginning: bool,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((topics.to_vec(), from_beginning));
        self.subscribe_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn run(&self, handler: MessageHandler) -> Result<(), TransportError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        loop {
            let waiting = self.wake.notified();
            let next = self.messages.lock().unwrap().pop_front();
            match next {
                Some((topic, message)) => handler(topic, message).await?,
                None => {
                    if self.closed.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    waiting.await;
                }
            }
        }
    }
}

/// In-process producer transport recording every delivered batch.
pub struct MockProducerTransport {
    connect_results: Mutex<VecDeque<Result<(), TransportError>>>,
    send_results: Mutex<VecDeque<Result<(), TransportError>>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub send_attempts: AtomicUsize,
    batches: Mutex<Vec<Vec<TopicMessages>>>,
}

impl MockProducerTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(MockProducerTransport {
            connect_results: Mutex::new(VecDeque::new()),
            send_results: Mutex::new(VecDeque::new()),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            send_attempts: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn script_connect(&self, results: Vec<Result<(), TransportError>>) {
        self.connect_results.lock().unwrap().extend(results);
    }

    /// Queue outcomes for upcoming `send_batch` calls; unscripted calls
    /// succeed.
    pub fn script_send(&self, results: Vec<Result<(), TransportError>>) {
        self.send_results.lock().unwrap().extend(results);
    }

    /// Batches that were delivered successfully.
    pub fn delivered(&self) -> Vec<Vec<TopicMessages>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProducerTransport for MockProducerTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_batch(&self, batches: Vec<TopicMessages>) -> Result<(), TransportError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        let result = self
            .send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.batches.lock().unwrap().push(batches);
        }
        result
    }
}

/// Build a wire message with an optional schema header and payload.
pub fn wire_message(schema: Option<&str>, value: Option<Vec<u8>>) -> WireMessage {
    WireMessage {
        key: None,
        value,
        headers: WireHeaders {
            schema: schema.map(|name| name.as_bytes().to_vec()),
            correlation_id: None,
        },
    }
}

/// Poll `condition` until it holds, advancing (possibly paused) time.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition was not met in time");
}
