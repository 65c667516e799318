//! Kafka client configuration
//!
//! Thin builder-style structs translated into `rdkafka::ClientConfig` by
//! the transports in [`client`](crate::typestream::kafka::client).

use rdkafka::config::ClientConfig;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration shared by consumer and producer clients.
#[derive(Debug, Clone)]
pub struct CommonKafkaConfig {
    /// Broker list, e.g. `"localhost:9092"` or `"b1:9092,b2:9092"`
    pub brokers: String,
    /// Client id reported to the cluster
    pub client_id: Option<String>,
    /// Timeout for metadata probes and record delivery
    pub request_timeout: Duration,
    /// Additional raw librdkafka properties
    pub custom_config: HashMap<String, String>,
}

impl Default for CommonKafkaConfig {
    fn default() -> Self {
        CommonKafkaConfig {
            brokers: "localhost:9092".to_string(),
            client_id: None,
            request_timeout: Duration::from_secs(30),
            custom_config: HashMap::new(),
        }
    }
}

impl CommonKafkaConfig {
    fn apply(&self, config: &mut ClientConfig) {
        config.set("bootstrap.servers", &self.brokers);
        if let Some(client_id) = &self.client_id {
            config.set("client.id", client_id);
        }
        for (key, value) in &self.custom_config {
            config.set(key, value);
        }
    }
}

/// Configuration for [`KafkaConsumerTransport`](crate::typestream::kafka::client::KafkaConsumerTransport).
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    pub common: CommonKafkaConfig,
    pub group_id: String,
}

impl KafkaConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        KafkaConsumerConfig {
            common: CommonKafkaConfig {
                brokers: brokers.into(),
                ..Default::default()
            },
            group_id: group_id.into(),
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.common.client_id = Some(client_id.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.common.request_timeout = timeout;
        self
    }

    pub fn custom_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common.custom_config.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_client_config(&self, from_beginning: bool) -> ClientConfig {
        let mut config = ClientConfig::new();
        self.common.apply(&mut config);
        config.set("group.id", &self.group_id);
        config.set(
            "auto.offset.reset",
            if from_beginning { "earliest" } else { "latest" },
        );
        config.set("enable.auto.commit", "true");
        config
    }
}

/// Configuration for [`KafkaProducerTransport`](crate::typestream::kafka::client::KafkaProducerTransport).
#[derive(Debug, Clone)]
pub struct KafkaProducerConfig {
    pub common: CommonKafkaConfig,
}

impl KafkaProducerConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        KafkaProducerConfig {
            common: CommonKafkaConfig {
                brokers: brokers.into(),
                ..Default::default()
            },
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.common.client_id = Some(client_id.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.common.request_timeout = timeout;
        self
    }

    pub fn custom_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common.custom_config.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        self.common.apply(&mut config);
        // Keep per-topic ordering intact across broker retries
        config.set("max.in.flight.requests.per.connection", "1");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_config_carries_group_and_offset_reset() {
        let config = KafkaConsumerConfig::new("localhost:9092", "readers")
            .client_id("svc-1")
            .custom_property("session.timeout.ms", "10000");
        let client = config.to_client_config(true);

        assert_eq!(client.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client.get("group.id"), Some("readers"));
        assert_eq!(client.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(client.get("client.id"), Some("svc-1"));
        assert_eq!(client.get("session.timeout.ms"), Some("10000"));
    }

    #[test]
    fn consumer_config_without_from_beginning_reads_latest() {
        let config = KafkaConsumerConfig::new("localhost:9092", "readers");
        let client = config.to_client_config(false);
        assert_eq!(client.get("auto.offset.reset"), Some("latest"));
    }

    #[test]
    fn producer_config_limits_in_flight_requests() {
        let config = KafkaProducerConfig::new("localhost:9092");
        let client = config.to_client_config();
        assert_eq!(
            client.get("max.in.flight.requests.per.connection"),
            Some("1")
        );
    }
}
