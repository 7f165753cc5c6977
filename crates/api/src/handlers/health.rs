use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub cache: String,
}

fn component(result: Result<(), impl std::fmt::Display>, name: &str) -> String {
    match result {
        Ok(()) => "up".to_string(),
        Err(e) => {
            tracing::warn!(component = name, error = %e, "Health check failed");
            "down".to_string()
        }
    }
}

/// Health check endpoint. Returns 503 when a backing service is unreachable.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database = component(state.database.ping().await, "database");
    let cache = component(state.cache.ping().await, "cache");

    let healthy = database == "up" && cache == "up";
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
            cache,
        }),
    )
}
