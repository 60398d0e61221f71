use thiserror::Error;

/// Client-caused rejection of a transaction body. Maps to HTTP 400 at the
/// endpoint boundary and never propagates past it.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing or empty required field: {0}")]
    MissingField(&'static str),
}

/// Failure to hand an event to the stream. Maps to HTTP 503; the cause is
/// logged keyed by traceId but never surfaced to the client.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("stream connection is not ready")]
    NotReady,

    #[error("event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("retry budget exhausted after {attempts} attempts: {cause}")]
    Exhausted { attempts: u32, cause: String },
}

/// Fatal fault while establishing the stream connection. Never surfaced to a
/// client; the process driver turns it into a non-zero exit so an external
/// supervisor restarts us.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to build Kafka producer: {0}")]
    Client(#[source] rdkafka::error::KafkaError),

    #[error("broker {broker} unreachable: {cause}")]
    BrokerUnreachable { broker: String, cause: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("startup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
