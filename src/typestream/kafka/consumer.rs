//! Kafka consumer state machine
//!
//! Turns wire messages into typed events and dispatches them through the
//! processor pipeline. The consumer owns a closed state enum and a
//! single-slot deferred callback; every transition checks its required
//! source state with an atomic compare-and-set, so a stale scheduled
//! callback cannot corrupt a state that has already moved on.
//!
//! Transitions: `Disconnected → Connecting → Connected → Subscribing →
//! Subscribed → Running`, and `Disconnecting → Disconnected` from any
//! state. Failed transitions fall back to their source state and retry
//! after a fixed backoff.

use crate::typestream::event::processor::{process_topic_event, EventStreamProcessorConfig};
use crate::typestream::event::topic_event::{
    metadata_from_parts, CorrelationId, Topic, TopicEvent, TopicKey,
};
use crate::typestream::event::EventStreamError;
use crate::typestream::kafka::callback::Callback;
use crate::typestream::kafka::client::KafkaConsumerTransport;
use crate::typestream::kafka::config::KafkaConsumerConfig;
use crate::typestream::kafka::transport::{
    ConsumerTransport, MessageHandler, TransportError, WireMessage,
};
use crate::typestream::schema::{
    CachedRegistryOptions, CachedSchemaRegistry, SchemaName, SchemaRegistry,
};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

const RETRY_BACKOFF: Duration = Duration::from_millis(1000);

/// Connection lifecycle states of the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Subscribed,
    Running,
    Disconnecting,
}

/// Classification of per-message processing failures, routed through the
/// optional error hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingErrorKind {
    /// No processor group is registered for the message's topic
    NoProcessors,
    /// The message carried a schema header but no payload
    NoContent,
    /// Dispatching to processors failed
    Processor,
}

/// What the error hook decided: skip the message or propagate the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    Ignore,
    Throw,
}

/// Hook consulted for every classified processing failure. Absent hook
/// means every failure propagates.
pub type OnErrorHandler =
    dyn Fn(ProcessingErrorKind, &EventStreamError) -> ErrorDisposition + Send + Sync;

/// Processor configs registered for one or more topics.
#[derive(Clone)]
pub struct EventStreamTopicProcessor {
    pub topics: Vec<Topic>,
    pub processors: Vec<EventStreamProcessorConfig>,
}

impl EventStreamTopicProcessor {
    pub fn new(topics: Vec<Topic>, processors: Vec<EventStreamProcessorConfig>) -> Self {
        EventStreamTopicProcessor { topics, processors }
    }

    fn handles(&self, topic: &Topic) -> bool {
        self.topics.contains(topic)
    }
}

/// Consumer connection state machine over any [`ConsumerTransport`].
///
/// `enable()` and `disable()` are idempotent and only schedule work; all
/// lifecycle errors are converted into scheduled retries and logged, never
/// surfaced to the caller. Message processing failures are observable
/// through the optional error hook.
pub struct KafkaEventStreamConsumer {
    transport: Arc<dyn ConsumerTransport>,
    processors: Arc<Vec<EventStreamTopicProcessor>>,
    registry: Arc<CachedSchemaRegistry>,
    on_error: Option<Arc<OnErrorHandler>>,
    state: Mutex<ConsumerState>,
    enabled: AtomicBool,
    callback: Callback,
    weak_self: Weak<KafkaEventStreamConsumer>,
}

impl KafkaEventStreamConsumer {
    /// Consumer over an rdkafka transport built from `config`.
    pub fn with_config(
        config: KafkaConsumerConfig,
        processors: Vec<EventStreamTopicProcessor>,
        registry: Arc<dyn SchemaRegistry>,
        on_error: Option<Arc<OnErrorHandler>>,
    ) -> Arc<Self> {
        Self::with_transport(
            Arc::new(KafkaConsumerTransport::new(config)),
            processors,
            registry,
            on_error,
        )
    }

    /// Consumer over any transport implementation.
    pub fn with_transport(
        transport: Arc<dyn ConsumerTransport>,
        processors: Vec<EventStreamTopicProcessor>,
        registry: Arc<dyn SchemaRegistry>,
        on_error: Option<Arc<OnErrorHandler>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| KafkaEventStreamConsumer {
            transport,
            processors: Arc::new(processors),
            registry: Arc::new(CachedSchemaRegistry::with_options(
                registry,
                CachedRegistryOptions {
                    resolve_if_not_cached: true,
                },
            )),
            on_error,
            state: Mutex::new(ConsumerState::Disconnected),
            enabled: AtomicBool::new(false),
            callback: Callback::new(),
            weak_self: Weak::clone(weak),
        })
    }

    /// Owning handle for moving the machine into scheduled work. Cannot fail
    /// while a caller holds the consumer.
    fn strong(&self) -> Arc<Self> {
        self.weak_self.upgrade().expect("consumer already dropped")
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.lock().expect("consumer state lock poisoned")
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Start the consumer. Idempotent: a second call while enabled is a
    /// no-op.
    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            let this = self.strong();
            self.callback.immediate(async move { this.connect().await });
        }
    }

    /// Stop the consumer. Does not abort an in-flight operation; it only
    /// prevents new ones and schedules a disconnect.
    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            let this = self.strong();
            self.callback
                .immediate(async move { this.disconnect().await });
        }
    }

    fn transition(&self, from: ConsumerState, to: ConsumerState) -> bool {
        let mut state = self.state.lock().expect("consumer state lock poisoned");
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    fn schedule_next_state(&self, delay: Duration) {
        let this = self.strong();
        self.callback.once(delay, async move {
            this.next_state().await;
        });
    }

    fn schedule_disconnect(&self, delay: Duration) {
        let this = self.strong();
        self.callback
            .once(delay, async move { this.disconnect().await });
    }

    /// Resume the machine from wherever it currently is.
    async fn next_state(self: Arc<Self>) {
        let enabled = self.is_enabled();
        match self.state() {
            ConsumerState::Disconnected if enabled => self.connect().await,
            ConsumerState::Connected if enabled => self.subscribe().await,
            ConsumerState::Subscribed if enabled => self.run().await,
            ConsumerState::Connected | ConsumerState::Subscribed | ConsumerState::Running
                if !enabled =>
            {
                self.disconnect().await
            }
            _ => {}
        }
    }

    async fn connect(self: Arc<Self>) {
        if !self.transition(ConsumerState::Disconnected, ConsumerState::Connecting) {
            return;
        }
        match self.transport.connect().await {
            Ok(()) => {
                log::info!(target: "kafka_consumer", "Consumer connected");
                self.transition(ConsumerState::Connecting, ConsumerState::Connected);
                let this = Arc::clone(&self);
                self.callback
                    .immediate(async move { this.subscribe().await });
            }
            Err(error) => {
                log::warn!(target: "kafka_consumer", "Failed connecting: {}", error);
                self.transition(ConsumerState::Connecting, ConsumerState::Disconnected);
                self.schedule_next_state(RETRY_BACKOFF);
            }
        }
    }

    async fn subscribe(self: Arc<Self>) {
        if !self.transition(ConsumerState::Connected, ConsumerState::Subscribing) {
            return;
        }
        let topics = self.subscription_topics();
        match self.transport.subscribe(&topics, true).await {
            Ok(()) => {
                log::info!(
                    target: "kafka_consumer",
                    "Subscribed to {} topic(s)",
                    topics.len()
                );
                self.transition(ConsumerState::Subscribing, ConsumerState::Subscribed);
                let this = Arc::clone(&self);
                self.callback.immediate(async move { this.run().await });
            }
            Err(error) => {
                log::warn!(target: "kafka_consumer", "Failed subscribing: {}", error);
                self.transition(ConsumerState::Subscribing, ConsumerState::Connected);
                self.schedule_next_state(RETRY_BACKOFF);
            }
        }
    }

    async fn run(self: Arc<Self>) {
        if !self.transition(ConsumerState::Subscribed, ConsumerState::Running) {
            return;
        }
        let handler = self.message_handler();
        match self.transport.run(handler).await {
            Ok(()) => {
                // Subscription ended; the disconnect path owns the state now
            }
            Err(error) => {
                log::warn!(target: "kafka_consumer", "Failed to run: {}", error);
                if self.transition(ConsumerState::Running, ConsumerState::Subscribed) {
                    self.schedule_next_state(RETRY_BACKOFF);
                }
            }
        }
    }

    async fn disconnect(self: Arc<Self>) {
        {
            let mut state = self.state.lock().expect("consumer state lock poisoned");
            if *state == ConsumerState::Disconnected {
                return;
            }
            *state = ConsumerState::Disconnecting;
        }
        match self.transport.disconnect().await {
            Ok(()) => {
                log::info!(target: "kafka_consumer", "Consumer disconnected");
                self.transition(ConsumerState::Disconnecting, ConsumerState::Disconnected);
                self.schedule_next_state(Duration::ZERO);
            }
            Err(error) => {
                log::warn!(target: "kafka_consumer", "Failed disconnecting: {}", error);
                self.schedule_disconnect(RETRY_BACKOFF);
            }
        }
    }

    /// Deduplicated union of every configured topic, in registration order.
    fn subscription_topics(&self) -> Vec<Topic> {
        let mut seen = HashSet::new();
        let mut topics = Vec::new();
        for group in self.processors.iter() {
            for topic in &group.topics {
                if seen.insert(topic.clone()) {
                    topics.push(topic.clone());
                }
            }
        }
        topics
    }

    fn message_handler(&self) -> MessageHandler {
        let this = self.strong();
        Arc::new(move |topic, message| {
            let this = Arc::clone(&this);
            async move {
                this.handle_message(topic, message)
                    .await
                    .map_err(|error| TransportError::Other(error.to_string()))
            }
            .boxed()
        })
    }

    async fn handle_message(
        self: Arc<Self>,
        topic: Topic,
        message: WireMessage,
    ) -> Result<(), EventStreamError> {
        let schema_name = message
            .headers
            .schema
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        let Some(schema_name) = schema_name else {
            log::debug!(
                target: "kafka_consumer",
                "Topic message with no schema: {}: {} byte(s)",
                topic,
                message.value.as_ref().map(Vec::len).unwrap_or(0)
            );
            return Ok(());
        };

        let groups: Vec<&EventStreamTopicProcessor> = self
            .processors
            .iter()
            .filter(|group| group.handles(&topic))
            .collect();
        if groups.is_empty() {
            return self.classify(
                ProcessingErrorKind::NoProcessors,
                EventStreamError::NoProcessors(topic.to_string()),
            );
        }

        let Some(value) = message.value else {
            return self.classify(
                ProcessingErrorKind::NoContent,
                EventStreamError::NoContent(topic.to_string()),
            );
        };

        log::debug!(
            target: "kafka_consumer",
            "Received topic message: {} [{}]: {} byte(s)",
            topic,
            schema_name,
            value.len()
        );

        let raw_event = TopicEvent {
            topic,
            schema: Some(SchemaName::new(schema_name).into()),
            metadata: metadata_from_parts(
                message
                    .key
                    .as_deref()
                    .map(|bytes| TopicKey::new(String::from_utf8_lossy(bytes).into_owned())),
                message
                    .headers
                    .correlation_id
                    .as_deref()
                    .map(|bytes| CorrelationId::new(String::from_utf8_lossy(bytes).into_owned())),
            ),
            data: value,
        };

        let dispatch = futures::future::try_join_all(groups.iter().map(|group| {
            process_topic_event(self.registry.as_ref(), &raw_event, &group.processors)
        }))
        .await;
        if let Err(error) = dispatch {
            log::error!(
                target: "kafka_consumer",
                "Failed processing topic: {} [{:?}]",
                raw_event.topic,
                raw_event.schema.as_ref().and_then(|s| s.name())
            );
            return self.classify(ProcessingErrorKind::Processor, error);
        }
        Ok(())
    }

    /// Route a classified failure through the error hook: `Ignore` skips the
    /// message, an absent hook or `Throw` propagates.
    fn classify(
        &self,
        kind: ProcessingErrorKind,
        error: EventStreamError,
    ) -> Result<(), EventStreamError> {
        match &self.on_error {
            Some(hook) if hook(kind, &error) == ErrorDisposition::Ignore => {
                log::debug!(
                    target: "kafka_consumer",
                    "Ignoring {:?} error: {}",
                    kind,
                    error
                );
                Ok(())
            }
            _ => Err(error),
        }
    }
}
