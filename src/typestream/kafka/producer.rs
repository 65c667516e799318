//! Kafka producer state machine
//!
//! Queues emitted events locally, batches them, serializes each event
//! through its schema, and sends topic-grouped batches over the transport.
//!
//! Transitions: `Disconnected → Connecting → Ready ⇄ Sending`, and
//! `Disconnecting → Disconnected` from any state. `emit` always succeeds
//! locally; connectivity problems are only visible in the logs and in
//! delivery resuming once a backoff retry succeeds.

use crate::typestream::event::emitter::EventStreamEmitter;
use crate::typestream::event::error::EventStreamError;
use crate::typestream::event::topic_event::{EventData, TopicEvent};
use crate::typestream::kafka::callback::Callback;
use crate::typestream::kafka::client::KafkaProducerTransport;
use crate::typestream::kafka::config::KafkaProducerConfig;
use crate::typestream::kafka::transport::{
    ProducerTransport, TopicMessages, TransportError, WireRecord, WireRecordHeaders,
};
use crate::typestream::schema::{
    CachedRegistryOptions, CachedSchemaRegistry, SchemaName, SchemaRef, SchemaRegistry,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

const ENABLE_DELAY: Duration = Duration::from_millis(1000);
const CONNECT_BACKOFF: Duration = Duration::from_millis(5000);
const FLUSH_MAX_ITEMS: usize = 10;

/// Consecutive transient flush failures tolerated for one batch before the
/// emitter escalates to a full reconnect.
const MAX_TRANSIENT_FLUSH_FAILURES: u32 = 10;

/// Connection lifecycle states of the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Disconnected,
    Connecting,
    Ready,
    Sending,
    Disconnecting,
}

/// Options for [`KafkaEventStreamEmitter::enable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnableOptions {
    /// Drop any queued and batched events before starting
    pub reset_buffer: bool,
}

/// Options for [`KafkaEventStreamEmitter::disable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableOptions {
    /// Accepted for interface compatibility; disabling never forces a flush
    pub flush: bool,
}

enum FlushError {
    Transport(TransportError),
    Event(EventStreamError),
}

impl FlushError {
    fn is_connection(&self) -> bool {
        matches!(self, FlushError::Transport(error) if error.is_connection())
    }
}

impl std::fmt::Display for FlushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushError::Transport(error) => error.fmt(f),
            FlushError::Event(error) => error.fmt(f),
        }
    }
}

/// Producer connection state machine over any [`ProducerTransport`].
///
/// The queue is an unbounded FIFO of not-yet-sent events; the batch is the
/// subset currently being flushed. The batch is only refilled from the
/// queue when it is empty, so a failed send keeps its batch and retries the
/// same events on the next trigger.
pub struct KafkaEventStreamEmitter {
    transport: Arc<dyn ProducerTransport>,
    registry: Arc<CachedSchemaRegistry>,
    state: Mutex<ProducerState>,
    enabled: AtomicBool,
    queue: Mutex<VecDeque<TopicEvent<EventData>>>,
    batch: Mutex<Vec<TopicEvent<EventData>>>,
    flush_failures: AtomicU32,
    callback: Callback,
    weak_self: Weak<KafkaEventStreamEmitter>,
}

impl KafkaEventStreamEmitter {
    /// Emitter over an rdkafka transport built from `config`. The emitter
    /// starts enabled with empty buffers.
    pub fn with_config(config: KafkaProducerConfig, registry: Arc<dyn SchemaRegistry>) -> Arc<Self> {
        Self::with_transport(Arc::new(KafkaProducerTransport::new(config)), registry)
    }

    /// Emitter over any transport implementation. The emitter starts
    /// enabled with empty buffers.
    pub fn with_transport(
        transport: Arc<dyn ProducerTransport>,
        registry: Arc<dyn SchemaRegistry>,
    ) -> Arc<Self> {
        let emitter = Arc::new_cyclic(|weak| KafkaEventStreamEmitter {
            transport,
            registry: Arc::new(CachedSchemaRegistry::with_options(
                registry,
                CachedRegistryOptions {
                    resolve_if_not_cached: true,
                },
            )),
            state: Mutex::new(ProducerState::Disconnected),
            enabled: AtomicBool::new(false),
            queue: Mutex::new(VecDeque::new()),
            batch: Mutex::new(Vec::new()),
            flush_failures: AtomicU32::new(0),
            callback: Callback::new(),
            weak_self: Weak::clone(weak),
        });
        emitter.enable(EnableOptions { reset_buffer: true });
        emitter
    }

    /// Owning handle for moving the machine into scheduled work. Cannot fail
    /// while a caller holds the emitter.
    fn strong(&self) -> Arc<Self> {
        self.weak_self.upgrade().expect("emitter already dropped")
    }

    pub fn state(&self) -> ProducerState {
        *self.state.lock().expect("producer state lock poisoned")
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Events queued but not yet part of a batch
    pub fn queue_len(&self) -> usize {
        self.queue.lock().expect("producer queue lock poisoned").len()
    }

    /// Events in the batch currently being flushed or retried
    pub fn batch_len(&self) -> usize {
        self.batch.lock().expect("producer batch lock poisoned").len()
    }

    /// Start the emitter. Idempotent: a second call while enabled is a
    /// no-op.
    pub fn enable(&self, options: EnableOptions) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            if options.reset_buffer {
                self.queue
                    .lock()
                    .expect("producer queue lock poisoned")
                    .clear();
                self.batch
                    .lock()
                    .expect("producer batch lock poisoned")
                    .clear();
            }
            let this = self.strong();
            self.callback
                .once(ENABLE_DELAY, async move { this.connect().await });
        }
    }

    /// Mark the emitter inactive. Does not interrupt an in-flight send;
    /// it only prevents new connection attempts.
    pub fn disable(&self, _options: DisableOptions) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn transition(&self, from: ProducerState, to: ProducerState) -> bool {
        let mut state = self.state.lock().expect("producer state lock poisoned");
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn has_pending(&self) -> bool {
        self.queue_len() > 0 || self.batch_len() > 0
    }

    async fn on_event_queued(self: Arc<Self>) {
        match self.state() {
            ProducerState::Disconnected => self.connect().await,
            ProducerState::Ready => self.on_ready().await,
            _ => {}
        }
    }

    async fn connect(self: Arc<Self>) {
        if !self.is_enabled() {
            return;
        }
        if !self.transition(ProducerState::Disconnected, ProducerState::Connecting) {
            return;
        }
        self.callback.cancel();
        match self.transport.connect().await {
            Ok(()) => {
                log::info!(target: "kafka_emitter", "Producer connected");
                self.transition(ProducerState::Connecting, ProducerState::Ready);
                self.on_ready().await;
            }
            Err(error) => {
                log::warn!(target: "kafka_emitter", "Failed connecting: {}", error);
                self.transition(ProducerState::Connecting, ProducerState::Disconnected);
                self.schedule_connect(CONNECT_BACKOFF);
            }
        }
    }

    async fn on_ready(self: Arc<Self>) {
        match self.flush(Some(FLUSH_MAX_ITEMS)).await {
            Ok(()) => {
                self.flush_failures.store(0, Ordering::SeqCst);
                if self.is_enabled() && self.queue_len() > 0 {
                    self.schedule_event_queued();
                }
            }
            Err(error) => {
                log::warn!(target: "kafka_emitter", "Error during flush: {}", error);
                if error.is_connection() {
                    self.disconnect().await;
                    self.schedule_reconnect();
                } else {
                    let failures = self.flush_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    if failures >= MAX_TRANSIENT_FLUSH_FAILURES {
                        log::error!(
                            target: "kafka_emitter",
                            "Batch failed {} consecutive flushes, reconnecting",
                            failures
                        );
                        self.flush_failures.store(0, Ordering::SeqCst);
                        self.disconnect().await;
                        self.schedule_reconnect();
                    } else {
                        // Batch kept; retried on the next trigger
                        self.transition(ProducerState::Sending, ProducerState::Ready);
                    }
                }
            }
        }
    }

    fn schedule_connect(&self, delay: Duration) {
        let this = self.strong();
        self.callback
            .once(delay, async move { this.connect().await });
    }

    fn schedule_event_queued(&self) {
        let this = self.strong();
        self.callback
            .immediate(async move { this.on_event_queued().await });
    }

    fn schedule_reconnect(&self) {
        if self.is_enabled() && self.has_pending() {
            let this = self.strong();
            self.callback
                .once(CONNECT_BACKOFF, async move { this.connect().await });
        }
    }

    /// Send one batch: refill from the queue when the batch is empty (a
    /// non-empty batch means a previous flush is still retrying it), warm
    /// the schema cache, group by topic, serialize, and send.
    async fn flush(&self, max_items: Option<usize>) -> Result<(), FlushError> {
        if !self.transition(ProducerState::Ready, ProducerState::Sending) {
            return Ok(());
        }
        let batch = {
            let mut batch = self.batch.lock().expect("producer batch lock poisoned");
            if batch.is_empty() {
                let mut queue = self.queue.lock().expect("producer queue lock poisoned");
                let take = max_items.unwrap_or(queue.len()).min(queue.len());
                batch.extend(queue.drain(..take));
            }
            batch.clone()
        };
        if batch.is_empty() {
            self.transition(ProducerState::Sending, ProducerState::Ready);
            return Ok(());
        }

        let schema_names: Vec<SchemaName> = {
            let mut names: Vec<SchemaName> = Vec::new();
            for event in &batch {
                if let Some(SchemaRef::Name(name)) = &event.schema {
                    if !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
            names
        };
        let report = self.registry.cache_if_needed(&schema_names).await;
        for failed in &report.failed {
            log::warn!(
                target: "kafka_emitter",
                "Failed caching schema '{}': {}",
                failed.schema,
                failed.error
            );
        }

        let mut topic_batches: Vec<TopicMessages> = Vec::new();
        for event in &batch {
            let record = WireRecord {
                key: event.key().map(|key| key.as_str().to_string()),
                headers: WireRecordHeaders {
                    schema: event
                        .schema
                        .as_ref()
                        .and_then(SchemaRef::name)
                        .map(String::from),
                    correlation_id: event
                        .correlation_id()
                        .map(|correlation_id| correlation_id.as_str().to_string()),
                },
                value: self.serialize(event).await.map_err(FlushError::Event)?,
            };
            match topic_batches
                .iter_mut()
                .find(|topic_batch| topic_batch.topic == event.topic)
            {
                Some(topic_batch) => topic_batch.messages.push(record),
                None => topic_batches.push(TopicMessages {
                    topic: event.topic.clone(),
                    messages: vec![record],
                }),
            }
        }

        self.transport
            .send_batch(topic_batches)
            .await
            .map_err(FlushError::Transport)?;

        self.batch
            .lock()
            .expect("producer batch lock poisoned")
            .clear();
        self.transition(ProducerState::Sending, ProducerState::Ready);
        Ok(())
    }

    async fn disconnect(&self) {
        {
            let mut state = self.state.lock().expect("producer state lock poisoned");
            if *state == ProducerState::Disconnected {
                return;
            }
            *state = ProducerState::Disconnecting;
        }
        if let Err(error) = self.transport.disconnect().await {
            log::warn!(target: "kafka_emitter", "Failed disconnecting: {}", error);
        }
        *self.state.lock().expect("producer state lock poisoned") = ProducerState::Disconnected;
    }

    /// Serialize one event for the wire. Schemaless events pass raw bytes,
    /// text, or JSON-encoded values through unchanged; schema-encoded
    /// events go through their (cached) schema.
    async fn serialize(&self, event: &TopicEvent<EventData>) -> Result<Vec<u8>, EventStreamError> {
        let Some(schema_ref) = &event.schema else {
            return match &event.data {
                EventData::Bytes(bytes) => Ok(bytes.clone()),
                EventData::Text(text) => Ok(text.clone().into_bytes()),
                EventData::Value(value) => serde_json::to_vec(value)
                    .map_err(|e| EventStreamError::Serialization(e.to_string())),
            };
        };
        let value = event.data.as_value().ok_or_else(|| {
            EventStreamError::Serialization(
                "schema-encoded event requires structured data".to_string(),
            )
        })?;
        match schema_ref {
            SchemaRef::Value(schema) => Ok(schema.serialize(value)?),
            SchemaRef::Name(name) => {
                match self.registry.get_schema(name).await? {
                    Some(schema) => Ok(schema.serialize(value)?),
                    None => Err(EventStreamError::MissingSchema(name.to_string())),
                }
            }
        }
    }
}

#[async_trait]
impl EventStreamEmitter for KafkaEventStreamEmitter {
    /// Append the event to the local queue and trigger the queue-changed
    /// reaction. Always succeeds locally.
    async fn emit(&self, event: TopicEvent<EventData>) -> Result<(), EventStreamError> {
        self.queue
            .lock()
            .expect("producer queue lock poisoned")
            .push_back(event);
        let this = self.strong();
        tokio::spawn(async move { this.on_event_queued().await });
        Ok(())
    }
}
