//! Liveness endpoint

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(health))
}

#[derive(Serialize)]
struct Health {
    name: &'static str,
    version: &'static str,
}

/// GET /healthz - Report that the service is up
async fn health() -> Json<Health> {
    Json(Health {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
