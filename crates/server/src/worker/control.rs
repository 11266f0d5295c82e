//! Page messages: ticker pre-warming, cache clearing, manifest refresh and
//! status queries.

use std::sync::Arc;

use chrono::Utc;
use dashcache_core::manifest::{normalize_ticker, ticker_urls};
use dashcache_core::{CacheStatus, ControlMessage, Error, Request, RequestClass};
use serde::Serialize;
use tokio::sync::oneshot;
use url::Url;

use super::Worker;

/// Outcome of pre-warming one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheTickerReport {
    pub ticker: String,
    pub cached: usize,
    pub skipped: usize,
}

impl Worker {
    /// Handle one page message. `GET_CACHE_STATUS` delivers its answer on
    /// `reply`; other messages ignore it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a malformed ticker, or a cache error
    /// when the store itself is unusable.
    pub async fn handle_message(
        &self, message: ControlMessage, reply: Option<oneshot::Sender<CacheStatus>>,
    ) -> Result<(), Error> {
        tracing::debug!(kind = message.kind(), "page message");

        match message {
            ControlMessage::CacheTicker { ticker } => {
                self.cache_ticker(&ticker).await?;
            }
            ControlMessage::ClearCache => {
                self.clear_all().await?;
            }
            ControlMessage::UpdateCache => {
                self.update_static().await?;
            }
            ControlMessage::GetCacheStatus => {
                let status = self.cache_status().await?;
                match reply {
                    Some(reply) => {
                        if reply.send(status).is_err() {
                            tracing::debug!("status requester went away");
                        }
                    }
                    None => tracing::warn!("GET_CACHE_STATUS without a reply channel, dropping status"),
                }
            }
        }

        Ok(())
    }

    /// Run a page message as tracked work. Resolves to the status for
    /// `GET_CACHE_STATUS` and to `None` otherwise.
    pub async fn dispatch_message(self: &Arc<Self>, message: ControlMessage) -> Result<Option<CacheStatus>, Error> {
        let (reply, status) = oneshot::channel();
        let worker = Arc::clone(self);

        self.lifetime
            .wait_until(async move { worker.handle_message(message, Some(reply)).await })
            .await??;

        Ok(status.await.ok())
    }

    /// Fetch and store every known endpoint for one ticker.
    pub async fn cache_ticker(&self, ticker: &str) -> Result<CacheTickerReport, Error> {
        let ticker = normalize_ticker(ticker)?;
        let urls = ticker_urls(&self.origin, &self.ticker_endpoints, &ticker)?;
        let (cached, skipped) = self.refresh(&urls).await;

        tracing::info!(%ticker, cached, skipped, "ticker data cached");
        Ok(CacheTickerReport { ticker, cached, skipped })
    }

    /// Delete every store, whatever its version. Returns how many existed.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let mut cleared = 0;
        for name in self.db.store_names().await? {
            if self.db.delete_store(&name).await? {
                cleared += 1;
            }
        }
        tracing::info!(stores = cleared, "all caches cleared");
        Ok(cleared)
    }

    /// Re-fetch the static manifest into the current store. Returns how many
    /// entries were refreshed.
    pub async fn update_static(&self) -> Result<usize, Error> {
        let (refreshed, skipped) = self.refresh(&self.manifest).await;
        tracing::info!(refreshed, skipped, "static cache updated");
        Ok(refreshed)
    }

    /// Item counts of the current store.
    pub async fn cache_status(&self) -> Result<CacheStatus, Error> {
        let keys = self.current_store().keys().await?;
        let api_items = keys
            .iter()
            .filter_map(|key| Url::parse(&key.url).ok())
            .filter(|url| self.classifier.classify(url) == RequestClass::Api)
            .count() as u64;
        let total_items = keys.len() as u64;

        Ok(CacheStatus {
            cache_name: self.cache_name.clone(),
            version: self.version.clone(),
            total_items,
            static_items: total_items - api_items,
            api_items,
            timestamp: Utc::now(),
        })
    }

    /// Best-effort GET-and-store of each URL. Returns (stored, skipped).
    async fn refresh(&self, urls: &[Url]) -> (usize, usize) {
        let store = self.current_store();
        let mut stored = 0;
        let mut skipped = 0;

        for url in urls {
            let request = Request::get(url.clone());
            let outcome = match self.network.fetch(&request).await {
                Ok(response) if response.is_success() => store.put(&request, &response).await,
                Ok(response) => Err(Error::Network(format!("status {}", response.status.as_u16()))),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "skipping cache refresh");
                    skipped += 1;
                }
            }
        }

        (stored, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_cache_ticker_prewarms_endpoints() {
        let harness = Harness::started().await;
        harness.network.respond_with(&url("/api/stock/MSFT"), 200, "application/json", r#"{"p":1}"#);
        harness.network.respond_with(&url("/api/predict/MSFT"), 200, "application/json", r#"{"p":2}"#);
        harness.network.fail(&url("/api/oracle/MSFT"));

        let report = harness.worker.cache_ticker(" msft ").await.unwrap();

        assert_eq!(report, CacheTickerReport { ticker: "MSFT".into(), cached: 2, skipped: 1 });
        let status = harness.worker.cache_status().await.unwrap();
        assert_eq!(status.api_items, 2);
    }

    #[tokio::test]
    async fn test_cache_ticker_skips_error_status() {
        let harness = Harness::started().await;
        harness.network.respond_with(&url("/api/stock/ZZZZ"), 404, "application/json", "{}");

        let report = harness.worker.cache_ticker("ZZZZ").await.unwrap();
        assert_eq!(report.cached, 0);
        assert_eq!(report.skipped, 3);
    }

    #[tokio::test]
    async fn test_cache_ticker_rejects_bad_symbols() {
        let harness = Harness::started().await;
        let before = harness.network.call_count();
        let result = harness
            .worker
            .handle_message(ControlMessage::CacheTicker { ticker: "../admin".into() }, None)
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(harness.network.call_count(), before);
    }

    #[tokio::test]
    async fn test_clear_then_status_is_empty() {
        let harness = Harness::started().await;
        harness.db.open_store("stock-dashboard-v0.9.0").await.unwrap();

        harness.worker.handle_message(ControlMessage::ClearCache, None).await.unwrap();

        assert!(harness.db.store_names().await.unwrap().is_empty());
        let status = harness.worker.dispatch_message(ControlMessage::GetCacheStatus).await.unwrap().unwrap();
        assert_eq!(status.total_items, 0);
        assert_eq!(status.cache_name, "stock-dashboard-v1.2.0");
    }

    #[tokio::test]
    async fn test_status_is_stable_without_writes() {
        let harness = Harness::started().await;

        let first = harness.worker.cache_status().await.unwrap();
        let second = harness.worker.cache_status().await.unwrap();

        assert_eq!(first.total_items, 3);
        assert_eq!(first.static_items, 3);
        assert_eq!(first.api_items, 0);
        assert_eq!(
            (first.total_items, first.static_items, first.api_items),
            (second.total_items, second.static_items, second.api_items)
        );
    }

    #[tokio::test]
    async fn test_status_reply_channel() {
        let harness = Harness::started().await;
        let (reply, status) = oneshot::channel();

        harness.worker.handle_message(ControlMessage::GetCacheStatus, Some(reply)).await.unwrap();

        assert_eq!(status.await.unwrap().version, "1.2.0");
    }

    #[tokio::test]
    async fn test_status_without_reply_channel_is_dropped() {
        let harness = Harness::started().await;
        harness.worker.handle_message(ControlMessage::GetCacheStatus, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_non_status_message_returns_none() {
        let harness = Harness::started().await;
        let result = harness.worker.dispatch_message(ControlMessage::UpdateCache).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_cache_refreshes_manifest() {
        let harness = Harness::started().await;
        harness.network.respond_with(&url("/static/css/style.css"), 200, "text/css", "body{color:red}");
        harness.network.fail(&url("/"));

        let refreshed = harness.worker.update_static().await.unwrap();

        assert_eq!(refreshed, 2);
        let css = harness
            .store()
            .match_request(&Request::get(Url::parse(&url("/static/css/style.css")).unwrap()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(css.body.as_ref(), b"body{color:red}");
        assert_eq!(harness.store().count().await.unwrap(), 3);
    }
}
