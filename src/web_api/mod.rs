//! WebAPI - HTTP and WebSocket Transport Adapters
//!
//! ## Responsibilities
//!
//! - `POST /sync`: one message per request, implicit lock bracket for
//!   lock-required operations
//! - `GET /async`: WebSocket upgrade, persistent session with explicit
//!   locking and stream subscriptions
//! - `GET /healthz`: liveness probe
//!
//! Both transports feed the same dispatcher; only the authorization
//! model differs.

mod routes;

pub use routes::create_router;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.realtime.connection_count(),
    }))
}
