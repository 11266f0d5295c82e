//! Periodic eviction of stale API responses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashcache_core::{EntryStamp, Error, RequestClass};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use super::Worker;

impl Worker {
    /// Delete API entries whose `date` header is older than the retention
    /// window at `now`. Entries without a parseable date are kept.
    ///
    /// Returns the number of entries evicted.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let stale = self.stale_api_entries(now).await?;
        self.evict(&stale).await
    }

    /// API entries older than the retention window at `now`.
    pub(crate) async fn stale_api_entries(&self, now: DateTime<Utc>) -> Result<Vec<EntryStamp>, Error> {
        let stamps = self.current_store().stamps().await?;
        Ok(stamps
            .into_iter()
            .filter(|stamp| {
                Url::parse(&stamp.key.url).is_ok_and(|url| self.classifier.classify(&url) == RequestClass::Api)
            })
            .filter(|stamp| match stamp.date {
                Some(date) => now.signed_duration_since(date) > self.api_max_age,
                None => {
                    tracing::debug!(url = %stamp.key.url, "cached response has no usable date, keeping");
                    false
                }
            })
            .collect())
    }

    /// Delete the given entries unless a newer response was stored under the
    /// same key after they were read.
    pub(crate) async fn evict(&self, stale: &[EntryStamp]) -> Result<usize, Error> {
        let store = self.current_store();
        let mut evicted = 0;
        for stamp in stale {
            if store.delete_if_unchanged(stamp).await? {
                tracing::debug!(url = %stamp.key.url, date = ?stamp.date, "evicted stale API response");
                evicted += 1;
            } else {
                tracing::debug!(url = %stamp.key.url, "entry replaced or removed since read, keeping");
            }
        }
        Ok(evicted)
    }
}

/// Run [`Worker::sweep_expired`] every `period`, first one period after start.
pub fn spawn_sweeper(worker: Arc<Worker>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            match worker.sweep_expired(Utc::now()).await {
                Ok(0) => tracing::debug!("cache sweep found nothing to evict"),
                Ok(evicted) => tracing::info!(evicted, cache = %worker.cache_name(), "cache sweep finished"),
                Err(e) => tracing::warn!(error = %e, "cache sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use dashcache_core::exchange::format_http_date;
    use dashcache_core::{Request, Response};
    use http::{HeaderMap, HeaderValue, StatusCode, header};

    async fn put_dated(harness: &Harness, path: &str, date: Option<String>) {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(date) = date {
            headers.insert(header::DATE, HeaderValue::from_str(&date).unwrap());
        }
        let request = Request::get(Url::parse(&url(path)).unwrap());
        harness
            .store()
            .put(&request, &Response::new(StatusCode::OK, headers, "{}"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_stale_api_entries() {
        let harness = Harness::new().await;
        let now = Utc::now();
        let stale = format_http_date(now - chrono::Duration::hours(25));
        let fresh = format_http_date(now - chrono::Duration::hours(23));

        put_dated(&harness, "/api/stock/AAPL", Some(stale.clone())).await;
        put_dated(&harness, "/api/predict/AAPL", Some(fresh)).await;
        put_dated(&harness, "/api/oracle/AAPL", None).await;
        put_dated(&harness, "/api/market/overview", Some("yesterday-ish".into())).await;
        put_dated(&harness, "/static/js/app.js", Some(stale)).await;

        let evicted = harness.worker.sweep_expired(now).await.unwrap();

        assert_eq!(evicted, 1);
        let urls: Vec<String> = harness.store().keys().await.unwrap().into_iter().map(|k| k.url).collect();
        assert!(!urls.contains(&url("/api/stock/AAPL")));
        assert!(urls.contains(&url("/api/predict/AAPL")));
        assert!(urls.contains(&url("/api/oracle/AAPL")));
        assert!(urls.contains(&url("/api/market/overview")));
        assert!(urls.contains(&url("/static/js/app.js")));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let harness = Harness::new().await;
        let now = Utc::now();
        put_dated(&harness, "/api/crypto/BTC", Some(format_http_date(now - chrono::Duration::days(3)))).await;

        assert_eq!(harness.worker.sweep_expired(now).await.unwrap(), 1);
        assert_eq!(harness.worker.sweep_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_spares_response_stored_after_read() {
        let harness = Harness::new().await;
        let now = Utc::now();
        put_dated(&harness, "/api/stock/AAPL", Some(format_http_date(now - chrono::Duration::hours(25)))).await;

        let stale = harness.worker.stale_api_entries(now).await.unwrap();
        assert_eq!(stale.len(), 1);

        put_dated(&harness, "/api/stock/AAPL", Some(format_http_date(now))).await;

        assert_eq!(harness.worker.evict(&stale).await.unwrap(), 0);
        let request = Request::get(Url::parse(&url("/api/stock/AAPL")).unwrap());
        let kept = harness.store().match_request(&request).await.unwrap().unwrap();
        assert_eq!(kept.date().map(|d| d.timestamp()), Some(now.timestamp()));
        assert_eq!(harness.worker.sweep_expired(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_on_missing_store() {
        let harness = Harness::new().await;
        assert_eq!(harness.worker.sweep_expired(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_periodically() {
        let harness = Harness::new().await;
        let old = format_http_date(Utc::now() - chrono::Duration::days(2));
        put_dated(&harness, "/api/sentiment/AAPL", Some(old)).await;

        let sweeper = spawn_sweeper(Arc::clone(&harness.worker), Duration::from_millis(25));
        let store = harness.store();
        let mut remaining = store.count().await.unwrap();
        for _ in 0..40 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
            remaining = store.count().await.unwrap();
        }
        sweeper.abort();

        assert_eq!(remaining, 0);
    }
}
