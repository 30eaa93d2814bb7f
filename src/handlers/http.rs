//! Service-level handlers and shared state.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::json;

use crate::db::DbPool;
use crate::services::EventHub;

/// Shared application state for HTTP and WS handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub hub: EventHub,
}

impl AppState {
    pub fn new(db: DbPool, hub: EventHub) -> Self {
        Self { db, hub }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }
}

/// GET / — service banner.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "BLOGGY API Server",
        "status": "running",
        "timestamp": Utc::now()
    }))
}

/// GET /health — liveness probe.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let hub = state.hub().stats().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "bloggy",
            "connections": hub.connections
        })),
    )
}
