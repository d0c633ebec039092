// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP endpoint: uplink input, monitoring page and JSON API.
//!
//! | Route              | Method | Purpose                               |
//! |--------------------|--------|---------------------------------------|
//! | `/input`           | POST   | One LNS uplink (dialect JSON body)    |
//! | `/monitor`         | GET    | HTML table of pending fragment sets   |
//! | `/api/v1/pending`  | GET    | Pending fragment sets as JSON         |
//! | `/api/v1/stats`    | GET    | Service counters                      |
//! | `/api/v1/health`   | GET    | Liveness                              |

use crate::monitor;
use crate::pipeline::{Outcome, Pipeline};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Debug)]
pub struct HttpState {
    /// Pipeline fed by `/input`.
    pub pipeline: Arc<Pipeline>,
    /// When false, `/input` answers 404.
    pub input_enabled: bool,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: status.as_u16(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Build the full router.
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .merge(input_routes())
        .merge(ui_routes())
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn input_routes() -> Router<Arc<HttpState>> {
    Router::new().route("/input", post(input))
}

fn ui_routes() -> Router<Arc<HttpState>> {
    Router::new().route("/monitor", get(monitor_page))
}

fn api_routes() -> Router<Arc<HttpState>> {
    Router::new()
        .route("/api/v1/pending", get(pending))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/health", get(health))
}

/// POST /input
async fn input(State(state): State<Arc<HttpState>>, body: Bytes) -> Result<Response, ApiError> {
    if !state.input_enabled {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "HTTP input is disabled"));
    }

    let outcome = state.pipeline.handle_raw(&body).await;
    if let Outcome::Rejected(e) = &outcome {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, e.to_string()));
    }

    let body = json!({ "status": "received", "outcome": outcome.label() });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// GET /monitor
async fn monitor_page(State(state): State<Arc<HttpState>>) -> Html<String> {
    Html(monitor::render(&state.pipeline.store().snapshot()))
}

/// GET /api/v1/pending
async fn pending(State(state): State<Arc<HttpState>>) -> Response {
    Json(state.pipeline.store().snapshot()).into_response()
}

/// GET /api/v1/stats
async fn stats(State(state): State<Arc<HttpState>>) -> Response {
    Json(state.pipeline.stats().snapshot()).into_response()
}

/// GET /api/v1/health
async fn health(State(state): State<Arc<HttpState>>) -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "lns": state.pipeline.dialect(),
        "pending_devices": state.pipeline.store().len(),
    }))
    .into_response()
}
