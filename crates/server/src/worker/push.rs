//! Push messages and notification clicks.

use std::sync::Arc;

use bytes::Bytes;
use dashcache_core::message::{CLOSE_ACTION, route_for_tag};
use dashcache_core::{Error, NotificationOptions, PushPayload};
use serde::Serialize;
use url::Url;

use super::Worker;

/// What a notification click did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ClickOutcome {
    /// The `close` action: nothing opened.
    Dismissed,
    /// An open page was navigated and focused.
    Focused { url: Url },
    /// No page was open; a new window was requested.
    Opened { url: Url },
}

impl Worker {
    /// Show a notification for a push. Unparseable payloads show the
    /// defaults.
    pub async fn handle_push(&self, payload: Option<&[u8]>) -> Result<NotificationOptions, Error> {
        let options = NotificationOptions::from_push(PushPayload::parse(payload));
        self.notifier.show(&options).await?;
        tracing::info!(tag = %options.tag, title = %options.title, "notification shown");
        Ok(options)
    }

    /// Run [`Worker::handle_push`] as tracked work that outlives the caller.
    pub async fn dispatch_push(self: &Arc<Self>, payload: Option<Bytes>) -> Result<NotificationOptions, Error> {
        let worker = Arc::clone(self);
        self.lifetime
            .wait_until(async move { worker.handle_push(payload.as_deref()).await })
            .await?
    }

    /// Run [`Worker::handle_notification_click`] as tracked work that
    /// outlives the caller.
    pub async fn dispatch_notification_click(
        self: &Arc<Self>, tag: Option<String>, action: Option<String>,
    ) -> Result<ClickOutcome, Error> {
        let worker = Arc::clone(self);
        self.lifetime
            .wait_until(async move { worker.handle_notification_click(tag.as_deref(), action.as_deref()).await })
            .await?
    }

    /// Close the clicked notification and bring the dashboard to the page
    /// its tag points at.
    pub async fn handle_notification_click(
        &self, tag: Option<&str>, action: Option<&str>,
    ) -> Result<ClickOutcome, Error> {
        if let Some(tag) = tag {
            self.notifier.close(tag).await;
        }

        if action == Some(CLOSE_ACTION) {
            return Ok(ClickOutcome::Dismissed);
        }

        let target = self
            .origin
            .join(route_for_tag(tag))
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        if let Some(page) = self.clients.match_all().await.into_iter().next() {
            self.clients.navigate(page.id, &target).await?;
            self.clients.focus(page.id).await?;
            tracing::debug!(page = page.id, was_focused = page.focused, url = %target, "notification focused page");
            return Ok(ClickOutcome::Focused { url: target });
        }

        self.clients.open_window(&target).await?;
        tracing::debug!(url = %target, "notification opened window");
        Ok(ClickOutcome::Opened { url: target })
    }
}
