//! HTTP surface: control routes under `/__dashcache`, everything else is
//! proxied through the worker.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use dashcache_core::ControlMessage;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::WebError;
use crate::hub::{PageHub, pages_socket};
use crate::proxy;
use crate::worker::{ClickOutcome, Worker, WorkerState};

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    pub hub: Arc<PageHub>,
    pub max_body_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/__dashcache/message", post(post_message))
        .route("/__dashcache/push", post(post_push))
        .route("/__dashcache/notification-click", post(post_notification_click))
        .route("/__dashcache/clients", get(pages_socket))
        .route("/__dashcache/health", get(health))
        .fallback(proxy::forward)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Accepted {
    ok: bool,
}

async fn post_message(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, WebError> {
    let message = ControlMessage::from_slice(&body)?;

    Ok(match state.worker.dispatch_message(message).await? {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => (StatusCode::ACCEPTED, Json(Accepted { ok: true })).into_response(),
    })
}

async fn post_push(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, WebError> {
    let payload = (!body.is_empty()).then_some(body);
    let options = state.worker.dispatch_push(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(options)))
}

#[derive(Debug, Default, Deserialize)]
struct NotificationClick {
    tag: Option<String>,
    action: Option<String>,
}

async fn post_notification_click(
    State(state): State<AppState>, Json(click): Json<NotificationClick>,
) -> Result<Json<ClickOutcome>, WebError> {
    let outcome = state.worker.dispatch_notification_click(click.tag, click.action).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    state: WorkerState,
    cache_name: String,
    version: String,
    pages: usize,
    in_flight: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        state: state.worker.state(),
        cache_name: state.worker.cache_name().to_string(),
        version: state.worker.version().to_string(),
        pages: state.hub.page_count(),
        in_flight: state.worker.lifetime().pending(),
    })
}
