//! Fallback route: every request that is not a control route is an
//! intercepted fetch, except WebSocket upgrades, which are tunnelled.

use axum::body::{Body, to_bytes};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request as HttpRequest, State};
use axum::response::{IntoResponse, Response as HttpResponse};
use dashcache_client::{resolve_request_url, strip_hop_by_hop};
use dashcache_core::{Request, Response};

use crate::error::WebError;
use crate::routes::AppState;
use crate::tunnel;

pub async fn forward(State(state): State<AppState>, request: HttpRequest) -> Result<HttpResponse, WebError> {
    if tunnel::is_websocket_upgrade(request.headers()) {
        return upgrade(state, request).await;
    }

    let request = intercept(&state, request).await?;
    let response = state.worker.handle_fetch(request).await;
    Ok(into_http(response))
}

async fn upgrade(state: AppState, request: HttpRequest) -> Result<HttpResponse, WebError> {
    let (mut parts, _) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let origin = state.worker.origin();
    let target = resolve_request_url(origin, &parts.uri.to_string())?;
    Ok(tunnel::open(ws, origin, target, &parts.headers).await?)
}

/// Turn an inbound HTTP request into the worker's request value.
async fn intercept(state: &AppState, request: HttpRequest) -> Result<Request, WebError> {
    let (parts, body) = request.into_parts();
    let url = resolve_request_url(state.worker.origin(), &parts.uri.to_string())?;
    let body = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|_| WebError::BodyTooLarge(state.max_body_bytes))?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);

    Ok(Request { method: parts.method, url, headers, body })
}

fn into_http(response: Response) -> HttpResponse {
    let Response { status, mut headers, body } = response;
    strip_hop_by_hop(&mut headers);
    (status, headers, Body::from(body)).into_response()
}
