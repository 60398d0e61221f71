use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use sentinel_ingestor::config::Config;
use sentinel_ingestor::logging;
use sentinel_ingestor::publisher::StreamPublisher;
use sentinel_ingestor::server;
use sentinel_ingestor::startup;

#[derive(Parser)]
#[command(name = "sentinel-ingestor")]
#[command(about = "Transaction ingestion gateway for the risk pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion gateway (default)
    Serve {
        /// Listening port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Held until exit so buffered file logs are flushed.
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let port_override = match cli.command {
        Some(Commands::Serve { port }) => port,
        None => None,
    };

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(port) = port_override {
        config.port = port;
    }

    // Fail fast: a gateway that cannot publish must not accept work. The
    // endpoint only binds after the stream connection is Ready.
    let publisher = match startup::connect(&config).await {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            error!("stream connection failed, terminating: {e}");
            std::process::exit(1);
        }
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received, draining");
    };

    let serve_result = server::start_server(
        publisher.clone() as Arc<dyn StreamPublisher>,
        &config,
        shutdown,
    )
    .await;

    // Flush in-flight deliveries before exiting so accepted requests keep
    // their at-least-once guarantee.
    let drained = tokio::task::spawn_blocking(move || publisher.close()).await;
    if let Err(e) = drained {
        error!("producer drain failed: {e}");
    }

    if let Err(e) = serve_result {
        error!("server error: {e}");
        std::process::exit(1);
    }
    info!("sentinel ingestor stopped cleanly");
}
