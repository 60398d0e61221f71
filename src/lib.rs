pub mod config;
pub mod enrich;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod publisher;
pub mod server;
pub mod startup;
