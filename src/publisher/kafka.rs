use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{info, warn};

use crate::config::{Config, CLIENT_ID};
use crate::enrich::EnrichedEvent;
use crate::error::{PublishError, StartupError};
use crate::publisher::retry::{with_backoff, RetryPolicy, Sleeper, TokioSleeper};
use crate::publisher::{Ack, ConnectionState, ConnectionStateCell, StreamPublisher};

/// Upper bound on a single delivery attempt; the retry policy bounds the
/// overall publish latency.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// The process-wide stream connection: an rdkafka producer plus the retry
/// policy and connection-state cell. One instance is created at startup and
/// shared read-only by every request handler.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    state: ConnectionStateCell,
}

impl KafkaPublisher {
    /// Builds the producer and verifies the broker is reachable by fetching
    /// topic metadata. Blocking; run it off the async runtime.
    pub fn connect(config: &Config) -> Result<Self, StartupError> {
        Self::connect_with_timeout(config, METADATA_TIMEOUT)
    }

    /// As [`connect`](Self::connect), with the metadata-probe timeout
    /// injectable so the unreachable-broker path stays fast under test.
    pub fn connect_with_timeout(
        config: &Config,
        metadata_timeout: Duration,
    ) -> Result<Self, StartupError> {
        let state = ConnectionStateCell::new();
        state.set(ConnectionState::Connecting);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker)
            .set("client.id", CLIENT_ID)
            .set("compression.type", "gzip")
            .set("message.timeout.ms", SEND_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(StartupError::Client)?;

        producer
            .client()
            .fetch_metadata(Some(&config.topic), metadata_timeout)
            .map_err(|e| StartupError::BrokerUnreachable {
                broker: config.broker.clone(),
                cause: e.to_string(),
            })?;

        state.set(ConnectionState::Ready);
        info!(broker = %config.broker, topic = %config.topic, "Kafka producer connected and ready");

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            retry: config.retry,
            sleeper: Box::new(TokioSleeper),
            state,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Drains in-flight deliveries and marks the connection closed. Called
    /// once on shutdown; publishes issued afterwards fail with `NotReady`.
    pub fn close(&self) {
        if let Err(e) = self.producer.flush(FLUSH_TIMEOUT) {
            warn!(error = %e, "producer flush on shutdown failed");
        }
        self.state.set(ConnectionState::Closed);
    }
}

#[async_trait]
impl StreamPublisher for KafkaPublisher {
    async fn publish(&self, key: &str, event: &EnrichedEvent) -> Result<Ack, PublishError> {
        if !self.state.is_ready() {
            return Err(PublishError::NotReady);
        }

        let payload = serde_json::to_vec(event)?;

        let outcome = with_backoff(&self.retry, self.sleeper.as_ref(), |_| {
            let producer = self.producer.clone();
            let topic = self.topic.clone();
            let key = key.to_string();
            let payload = payload.clone();
            async move {
                let record = FutureRecord::to(&topic).key(&key).payload(&payload);
                producer
                    .send(record, SEND_TIMEOUT)
                    .await
                    .map(|(partition, offset)| Ack { partition, offset })
                    .map_err(|(error, _message)| error)
            }
        })
        .await;

        outcome.map_err(|exhausted| PublishError::Exhausted {
            attempts: exhausted.attempts,
            cause: exhausted.last.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_TOPIC};
    use crate::enrich::{Enricher, Provenance};
    use crate::payload::TransactionPayload;

    // Producer construction does not touch the network, so the Ready gate is
    // testable without a broker.
    fn publisher_in_state(state: ConnectionState) -> KafkaPublisher {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", "localhost:1")
            .create()
            .unwrap();
        let cell = ConnectionStateCell::new();
        cell.set(state);
        KafkaPublisher {
            producer,
            topic: "transaction-stream".to_string(),
            retry: RetryPolicy::default(),
            sleeper: Box::new(TokioSleeper),
            state: cell,
        }
    }

    fn event() -> EnrichedEvent {
        Enricher::new(Provenance::default()).enrich(TransactionPayload {
            user_id: "u1".to_string(),
            amount: 1.0,
            merchant_id: None,
            location: None,
            currency: None,
        })
    }

    #[tokio::test]
    async fn publish_before_ready_fails_without_touching_the_stream() {
        for state in [ConnectionState::Disconnected, ConnectionState::Connecting] {
            let publisher = publisher_in_state(state);
            let result = publisher.publish("u1", &event()).await;
            assert!(matches!(result, Err(PublishError::NotReady)));
        }
    }

    // Nothing listens on port 1, so the metadata probe must fail and the
    // sequencer never gets a publisher to serve with.
    #[test]
    fn connect_to_unreachable_broker_reports_startup_failure() {
        let config = Config {
            port: 0,
            broker: "localhost:1".to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            provenance: Provenance::default(),
            retry: RetryPolicy::default(),
        };

        match KafkaPublisher::connect_with_timeout(&config, Duration::from_millis(200)) {
            Err(StartupError::BrokerUnreachable { broker, .. }) => {
                assert_eq!(broker, "localhost:1");
            }
            Err(e) => panic!("unexpected startup error: {e}"),
            Ok(_) => panic!("connect succeeded against an unreachable broker"),
        }
    }

    #[tokio::test]
    async fn publish_after_close_fails_fast() {
        let publisher = publisher_in_state(ConnectionState::Ready);
        publisher.close();
        assert_eq!(publisher.state(), ConnectionState::Closed);
        let result = publisher.publish("u1", &event()).await;
        assert!(matches!(result, Err(PublishError::NotReady)));
    }
}
