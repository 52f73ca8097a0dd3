//! Read-only HTTP surface over a [`RecommendationEngine`].
//!
//! Every endpoint except `/health` answers with a `{success, data}` envelope,
//! or `{success: false, error}` and a matching status code.

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::RecommendError;
use crate::recommend::RecommendationEngine;

pub const DEFAULT_LIMIT: usize = 10;

type ServerState = Arc<RecommendationEngine>;

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope { success: true, data: Some(data), error: None }).into_response()
}

fn fail(status: StatusCode, error: impl ToString) -> Response {
    let body: Envelope<()> = Envelope { success: false, data: None, error: Some(error.to_string()) };
    (status, Json(body)).into_response()
}

impl IntoResponse for RecommendError {
    fn into_response(self) -> Response {
        let status = match self {
            RecommendError::NotFound { .. } => StatusCode::NOT_FOUND,
            RecommendError::ConcurrencyConflict => StatusCode::CONFLICT,
            RecommendError::MalformedImport(_) => StatusCode::BAD_REQUEST,
            RecommendError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        fail(status, self)
    }
}

/// `limit` stays a string so that junk like `?limit=abc` falls back to the
/// default instead of failing extraction.
#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

impl LimitQuery {
    fn get(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&limit| limit > 0)
            .unwrap_or(DEFAULT_LIMIT)
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tracks(State(engine): State<ServerState>) -> Response {
    ok(engine.catalog().all_tracks())
}

async fn get_track(State(engine): State<ServerState>, Path(id): Path<String>) -> Response {
    match engine.catalog().get_track(&id) {
        Some(track) => ok(track),
        None => RecommendError::track_not_found(id).into_response(),
    }
}

async fn recommend_track(
    State(engine): State<ServerState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    debug!("GET /recommend/track/{id}");
    match engine.recommend_for_track(&id, query.get()) {
        Ok(recs) => ok(recs),
        Err(e) => e.into_response(),
    }
}

async fn recommend_user(
    State(engine): State<ServerState>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Response {
    ok(engine.recommend_for_user(&user_id, query.get()))
}

pub fn make_app(engine: Arc<RecommendationEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tracks", get(list_tracks))
        .route("/tracks/{id}", get(get_track))
        .route("/recommend/track/{id}", get(recommend_track))
        .route("/recommend/user/{user_id}", get(recommend_user))
        .with_state(engine)
}

/// Serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_server(engine: Arc<RecommendationEngine>, port: u16) -> Result<()> {
    let app = make_app(engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
