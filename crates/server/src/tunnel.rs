//! WebSocket pass-through to the dashboard origin.
//!
//! Upgrade requests are never classified or cached. The upstream socket is
//! opened first so a dead origin answers 502 instead of an accepted upgrade
//! that closes at once. Frames are then relayed in both directions until
//! either side closes.

use axum::extract::ws::{CloseFrame as PageCloseFrame, Message as PageMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response as HttpResponse;
use dashcache_core::Error;
use futures_util::{SinkExt, StreamExt};
use http::{HeaderMap, header};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as OriginMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as OriginCloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

type OriginSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Page headers carried over to the origin handshake.
const FORWARDED: &[header::HeaderName] = &[
    header::COOKIE,
    header::AUTHORIZATION,
    header::ORIGIN,
    header::USER_AGENT,
    header::SEC_WEBSOCKET_PROTOCOL,
];

/// True for `Connection: upgrade` with `Upgrade: websocket`.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));
    connection_upgrade && upgrade_websocket
}

/// `ws`/`wss` form of an http(s) URL on the dashboard origin.
fn socket_url(origin: &Url, target: &Url) -> Result<Url, Error> {
    if target.origin() != origin.origin() {
        return Err(Error::InvalidUrl(format!("{target}: websocket upgrades only reach the dashboard origin")));
    }
    let mut url = target.clone();
    let scheme = if target.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| Error::InvalidUrl(format!("{target}: cannot use {scheme} scheme")))?;
    Ok(url)
}

/// Connect to the origin socket, then accept the page's upgrade and relay.
pub async fn open(ws: WebSocketUpgrade, origin: &Url, target: Url, headers: &HeaderMap) -> Result<HttpResponse, Error> {
    let url = socket_url(origin, &target)?;

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
    for name in FORWARDED {
        for value in headers.get_all(name) {
            request.headers_mut().append(name.clone(), value.clone());
        }
    }

    let (upstream, handshake) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::Network(format!("{url}: {e}")))?;

    let protocol = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::debug!(%url, ?protocol, "tunnelling websocket to origin");

    let ws = match protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };
    Ok(ws.on_upgrade(move |page| relay(page, upstream, url)))
}

async fn relay(mut page: WebSocket, mut upstream: OriginSocket, url: Url) {
    let mut frames = 0u64;

    loop {
        tokio::select! {
            inbound = page.recv() => {
                let Some(Ok(message)) = inbound else { break };
                let closing = matches!(message, PageMessage::Close(_));
                if let Some(message) = to_origin(message)
                    && upstream.send(message).await.is_err()
                {
                    break;
                }
                frames += 1;
                if closing {
                    break;
                }
            }
            outbound = upstream.next() => {
                let Some(Ok(message)) = outbound else { break };
                let closing = matches!(message, OriginMessage::Close(_));
                if let Some(message) = to_page(message)
                    && page.send(message).await.is_err()
                {
                    break;
                }
                frames += 1;
                if closing {
                    break;
                }
            }
        }
    }

    let _ = upstream.close(None).await;
    let _ = page.close().await;
    tracing::debug!(%url, frames, "websocket tunnel closed");
}

/// Ping and pong are answered on each leg and not relayed.
fn to_origin(message: PageMessage) -> Option<OriginMessage> {
    match message {
        PageMessage::Text(text) => Some(OriginMessage::Text(text)),
        PageMessage::Binary(data) => Some(OriginMessage::Binary(data)),
        PageMessage::Close(frame) => Some(OriginMessage::Close(frame.map(|f| OriginCloseFrame {
            code: f.code.into(),
            reason: f.reason,
        }))),
        PageMessage::Ping(_) | PageMessage::Pong(_) => None,
    }
}

fn to_page(message: OriginMessage) -> Option<PageMessage> {
    match message {
        OriginMessage::Text(text) => Some(PageMessage::Text(text)),
        OriginMessage::Binary(data) => Some(PageMessage::Binary(data)),
        OriginMessage::Close(frame) => Some(PageMessage::Close(frame.map(|f| PageCloseFrame {
            code: f.code.into(),
            reason: f.reason,
        }))),
        OriginMessage::Ping(_) | OriginMessage::Pong(_) | OriginMessage::Frame(_) => None,
    }
}
