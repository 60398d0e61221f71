use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use hyper::Server;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use crate::config::Config;
use crate::enrich::Enricher;
use crate::error::ValidationError;
use crate::metrics;
use crate::payload::{validate, RawTransaction};
use crate::publisher::StreamPublisher;

/// Per-process dependencies of the ingestion endpoint. The publisher is
/// injected so tests can substitute a fake stream.
pub struct AppState {
    pub publisher: Arc<dyn StreamPublisher>,
    pub enricher: Enricher,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "sentinel-ingestor",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn invalid_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid payload structure" })),
    )
        .into_response()
}

/// `POST /api/v1/transaction`: validate, enrich, publish, map the outcome.
/// Every request resolves to exactly one of 202 / 400 / 503.
async fn ingest_transaction(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<RawTransaction>, JsonRejection>,
) -> Response {
    // Undecodable bodies get the same rejection as structurally invalid ones.
    let raw = match body {
        Ok(Json(raw)) => raw,
        Err(_) => {
            metrics::transaction_rejected();
            return invalid_payload();
        }
    };

    let payload = match validate(raw) {
        Ok(payload) => payload,
        Err(ValidationError::MissingField(field)) => {
            debug!(field, "rejected transaction payload");
            metrics::transaction_rejected();
            return invalid_payload();
        }
    };

    let event = state.enricher.enrich(payload);
    let trace_id = event.trace_id.clone();

    let started = Instant::now();
    let published = state.publisher.publish(&event.user_id, &event).await;
    metrics::publish_duration_seconds(started.elapsed().as_secs_f64());

    match published {
        Ok(ack) => {
            metrics::transaction_accepted();
            debug!(trace_id = %trace_id, partition = ack.partition, offset = ack.offset,
                "transaction queued");
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "QUEUED",
                    "traceId": trace_id,
                    "message": "Transaction accepted for risk analysis.",
                })),
            )
                .into_response()
        }
        Err(e) => {
            metrics::publish_failed();
            // Cause stays in the logs; the response body is deliberately opaque.
            error!(trace_id = %trace_id, error = %e, "stream publish failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Service Unavailable - Event Bus Down" })),
            )
                .into_response()
        }
    }
}

/// Builds the router with the ingestion and health routes.
pub fn create_router(publisher: Arc<dyn StreamPublisher>, enricher: Enricher) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let state = Arc::new(AppState {
        publisher,
        enricher,
    });

    Router::new()
        .route("/api/v1/transaction", post(ingest_transaction))
        .route("/health", get(health))
        .layer(Extension(state))
        .layer(cors)
}

/// Binds the HTTP listener and serves until `shutdown` resolves. Only called
/// after the startup sequencer has a Ready publisher.
pub async fn start_server(
    publisher: Arc<dyn StreamPublisher>,
    config: &Config,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), hyper::Error> {
    let prometheus = match metrics::init_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let mut app = create_router(publisher, Enricher::new(config.provenance.clone()));
    if let Some(handle) = prometheus {
        app = app.route("/metrics", get(move || async move { handle.render() }));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Sentinel ingestor listening on http://localhost:{}", config.port);
    println!("💚 Health check: http://localhost:{}/health", config.port);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
