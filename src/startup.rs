use tracing::info;

use crate::config::Config;
use crate::error::StartupError;
use crate::publisher::kafka::KafkaPublisher;

/// Startup sequencer: establishes the stream connection exactly once. The
/// caller (`main`) owns the fail-fast decision — on `Err` it terminates the
/// process instead of serving traffic it cannot deliver.
pub async fn connect(config: &Config) -> Result<KafkaPublisher, StartupError> {
    info!(broker = %config.broker, topic = %config.topic, "establishing stream connection");

    // Producer construction and the metadata probe are blocking librdkafka
    // calls; keep them off the runtime worker threads.
    let cfg = config.clone();
    let publisher = tokio::task::spawn_blocking(move || KafkaPublisher::connect(&cfg)).await??;

    Ok(publisher)
}
