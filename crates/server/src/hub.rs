//! Open dashboard pages, connected over WebSocket.
//!
//! Each page holds one socket to `/__dashcache/clients`. The hub keeps an
//! event queue per page and implements the worker's [`Clients`] and
//! [`Notifier`] capabilities on top of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use dashcache_core::{CacheStatus, ControlMessage, Error, NotificationOptions};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

use crate::routes::AppState;
use crate::worker::{Clients, Notifier, PageId, PageInfo};

/// Event delivered to a page, as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum PageEvent {
    #[serde(rename = "controllerchange")]
    ControllerChange,
    #[serde(rename = "notification")]
    Notification(NotificationOptions),
    #[serde(rename = "notification-close")]
    NotificationClose { tag: String },
    #[serde(rename = "navigate")]
    Navigate { url: String },
    #[serde(rename = "focus")]
    Focus,
    #[serde(rename = "CACHE_STATUS")]
    CacheStatus(CacheStatus),
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl PageEvent {
    fn error(err: &Error) -> Self {
        PageEvent::Error { code: err.code().to_string(), message: err.to_string() }
    }
}

/// Page-side signals that are not control messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum PageSignal {
    Focus,
}

struct Page {
    id: PageId,
    url: Url,
    /// Sequence number of the last focus; 0 if never focused.
    last_focus: u64,
    events: mpsc::UnboundedSender<PageEvent>,
}

pub struct PageHub {
    origin: Url,
    pages: Mutex<Vec<Page>>,
    next_id: AtomicU64,
    focus_seq: AtomicU64,
    /// Window requested while no page was open; handed to the next page.
    pending_open: Mutex<Option<Url>>,
}

impl PageHub {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            pages: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            focus_seq: AtomicU64::new(1),
            pending_open: Mutex::new(None),
        }
    }

    /// Register an open page and return its event queue.
    pub fn register(&self, url: Url) -> (PageId, mpsc::UnboundedReceiver<PageEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (events, receiver) = mpsc::unbounded_channel();
        let mut page = Page { id, url, last_focus: 0, events };

        let pending = self.pending_open.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(target) = pending {
            let _ = page.events.send(PageEvent::Navigate { url: target.to_string() });
            let _ = page.events.send(PageEvent::Focus);
            page.url = target;
            page.last_focus = self.focus_seq.fetch_add(1, Ordering::SeqCst);
        }

        tracing::debug!(page = id, url = %page.url, "page connected");
        self.lock_pages().push(page);
        (id, receiver)
    }

    pub fn unregister(&self, id: PageId) {
        self.lock_pages().retain(|page| page.id != id);
        tracing::debug!(page = id, "page disconnected");
    }

    pub fn page_count(&self) -> usize {
        self.lock_pages().len()
    }

    #[cfg(test)]
    pub fn page_url(&self, id: PageId) -> Option<Url> {
        self.lock_pages().iter().find(|page| page.id == id).map(|page| page.url.clone())
    }

    /// Record that a page gained focus.
    pub fn mark_focused(&self, id: PageId) {
        let seq = self.focus_seq.fetch_add(1, Ordering::SeqCst);
        if let Some(page) = self.lock_pages().iter_mut().find(|page| page.id == id) {
            page.last_focus = seq;
        }
    }

    fn send(&self, id: PageId, event: PageEvent) -> Result<(), Error> {
        let pages = self.lock_pages();
        let page = pages
            .iter()
            .find(|page| page.id == id)
            .ok_or_else(|| Error::ClientGone(format!("page {id}")))?;
        page.events
            .send(event)
            .map_err(|_| Error::ClientGone(format!("page {id}")))
    }

    fn broadcast(&self, event: &PageEvent) -> usize {
        self.lock_pages()
            .iter()
            .filter(|page| page.events.send(event.clone()).is_ok())
            .count()
    }

    fn lock_pages(&self) -> MutexGuard<'_, Vec<Page>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Clients for PageHub {
    async fn match_all(&self) -> Vec<PageInfo> {
        let pages = self.lock_pages();
        let mut matched: Vec<&Page> =
            pages.iter().filter(|page| page.url.origin() == self.origin.origin()).collect();
        matched.sort_by(|a, b| b.last_focus.cmp(&a.last_focus));

        matched
            .iter()
            .enumerate()
            .map(|(i, page)| PageInfo { id: page.id, url: page.url.clone(), focused: i == 0 && page.last_focus > 0 })
            .collect()
    }

    async fn claim(&self) -> usize {
        self.broadcast(&PageEvent::ControllerChange)
    }

    async fn navigate(&self, id: PageId, url: &Url) -> Result<(), Error> {
        self.send(id, PageEvent::Navigate { url: url.to_string() })?;
        if let Some(page) = self.lock_pages().iter_mut().find(|page| page.id == id) {
            page.url = url.clone();
        }
        Ok(())
    }

    async fn focus(&self, id: PageId) -> Result<(), Error> {
        self.send(id, PageEvent::Focus)?;
        self.mark_focused(id);
        Ok(())
    }

    async fn open_window(&self, url: &Url) -> Result<(), Error> {
        tracing::info!(%url, "no open page, window will open on next connection");
        *self.pending_open.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
        Ok(())
    }
}

#[async_trait]
impl Notifier for PageHub {
    async fn show(&self, options: &NotificationOptions) -> Result<(), Error> {
        let delivered = self.broadcast(&PageEvent::Notification(options.clone()));
        if delivered == 0 {
            tracing::debug!(tag = %options.tag, "no page to display notification");
        }
        Ok(())
    }

    async fn close(&self, tag: &str) {
        self.broadcast(&PageEvent::NotificationClose { tag: tag.to_string() });
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    url: Option<String>,
}

/// `GET /__dashcache/clients?url=`: register the caller as an open page.
pub async fn pages_socket(
    ws: WebSocketUpgrade, Query(params): Query<PageParams>, State(state): State<AppState>,
) -> Response {
    let origin = state.worker.origin().clone();
    let url = params
        .url
        .as_deref()
        .and_then(|raw| origin.join(raw).ok())
        .unwrap_or(origin);
    ws.on_upgrade(move |socket| serve_page(socket, state, url))
}

async fn serve_page(mut socket: WebSocket, state: AppState, url: Url) {
    let (id, mut events) = state.hub.register(url);

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_page_text(&state, id, &text).await
                            && send_event(&mut socket, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            event = events.recv() => {
                match event {
                    Some(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.hub.unregister(id);
}

/// Handle one text frame from a page; returns the direct reply, if any.
async fn handle_page_text(state: &AppState, id: PageId, text: &str) -> Option<PageEvent> {
    if let Ok(PageSignal::Focus) = serde_json::from_str::<PageSignal>(text) {
        state.hub.mark_focused(id);
        return None;
    }

    let message = match ControlMessage::from_slice(text.as_bytes()) {
        Ok(message) => message,
        Err(e) => return Some(PageEvent::error(&e)),
    };

    match state.worker.dispatch_message(message).await {
        Ok(Some(status)) => Some(PageEvent::CacheStatus(status)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(page = id, error = %e, "page message failed");
            Some(PageEvent::error(&e))
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &PageEvent) -> Result<(), ()> {
    let payload = serde_json::to_string(event).map_err(|_| ())?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}
