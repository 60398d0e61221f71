use std::env;

use crate::enrich::Provenance;
use crate::error::StartupError;
use crate::publisher::retry::RetryPolicy;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BROKER: &str = "localhost:29092";
pub const DEFAULT_TOPIC: &str = "transaction-stream";
pub const CLIENT_ID: &str = "sentinel-ingest-gateway";

/// Process configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listening port (`PORT`).
    pub port: u16,
    /// Kafka bootstrap server (`KAFKA_BROKER`).
    pub broker: String,
    /// Destination topic (`TRANSACTION_TOPIC`).
    pub topic: String,
    /// Static provenance tag stamped onto every event.
    pub provenance: Provenance,
    /// Backoff policy applied around each publish call.
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, StartupError> {
        let port = match env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| StartupError::Config(format!("PORT is not a valid port: '{v}'")))?,
            Err(_) => DEFAULT_PORT,
        };

        let broker = env::var("KAFKA_BROKER").unwrap_or_else(|_| DEFAULT_BROKER.to_string());
        let topic = env::var("TRANSACTION_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string());

        let mut provenance = Provenance::default();
        if let Ok(source) = env::var("EVENT_SOURCE") {
            provenance.source = source;
        }
        if let Ok(version) = env::var("EVENT_VERSION") {
            provenance.version = version;
        }

        Ok(Self {
            port,
            broker,
            topic,
            provenance,
            retry: RetryPolicy::default(),
        })
    }
}
