pub mod error;
pub mod handlers;

use crate::core::engine::ScaffoldEngine;
use crate::domain::ports::ProjectStore;
use crate::utils::error::{Result, ScaffoldError};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use error::ApiError;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScaffoldEngine>,
    pub store: Option<Arc<dyn ProjectStore>>,
}

impl AppState {
    pub fn new(engine: ScaffoldEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            store: None,
        }
    }

    pub fn with_store(mut self, store: Option<Arc<dyn ProjectStore>>) -> Self {
        self.store = store;
        self
    }
}

pub fn router(state: AppState, cors_origin: &str) -> Result<Router> {
    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/api/templates", get(handlers::templates))
        .route("/api/generate", post(handlers::generate))
        .fallback(|| async { ApiError::NotFound })
        .layer(cors_layer(cors_origin)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// `"*"` allows any origin without credentials; anything else is a single
/// origin allowed with credentials.
fn cors_layer(origin: &str) -> Result<CorsLayer> {
    if origin == "*" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origin = HeaderValue::from_str(origin).map_err(|e| ScaffoldError::InvalidConfigValueError {
        field: "server.cors_origin".to_string(),
        value: origin.to_string(),
        reason: e.to_string(),
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}
