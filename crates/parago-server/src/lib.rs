//! HTTP service exposing the receipt scan pipeline.

pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;

use parago_core::{RecordStore, ScanPipeline};

/// Listener configuration for the service binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Load bind address from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("PARAGO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PARAGO_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ScanPipeline>,
    pub store: Arc<dyn RecordStore>,
    pub max_body_bytes: usize,
}

impl AppState {
    /// The request body limit sits above the per-file ceiling so oversized
    /// uploads reach the pipeline's own validation instead of a transport 413.
    pub fn new(pipeline: ScanPipeline, store: Arc<dyn RecordStore>, max_file_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            max_body_bytes: max_file_bytes.saturating_mul(4),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/receipts/scan", post(handlers::scan_receipts))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(DefaultBodyLimit::max(state.max_body_bytes)))
        .with_state(state)
}
