//! Capabilities the worker needs from whatever hosts the dashboard pages.

use async_trait::async_trait;
use dashcache_core::{Error, NotificationOptions};
use url::Url;

/// Identifier of one open dashboard page.
pub type PageId = u64;

/// An open page as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub url: Url,
    pub focused: bool,
}

/// Open dashboard pages.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Same-origin pages, the focused one first.
    async fn match_all(&self) -> Vec<PageInfo>;

    /// Take control of every open page. Returns how many were claimed.
    async fn claim(&self) -> usize;

    async fn navigate(&self, id: PageId, url: &Url) -> Result<(), Error>;

    async fn focus(&self, id: PageId) -> Result<(), Error>;

    /// Open `url` in a new window.
    async fn open_window(&self, url: &Url) -> Result<(), Error>;
}

/// System notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, options: &NotificationOptions) -> Result<(), Error>;

    async fn close(&self, tag: &str);
}
