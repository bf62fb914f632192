//! Liveness endpoints

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

pub fn status_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/system_status", get(system_status))
}

async fn health_check() -> &'static str {
    "OK"
}

/// GET /system_status
async fn system_status() -> Json<Value> {
    Json(json!({ "message": "System is running properly ✅" }))
}
