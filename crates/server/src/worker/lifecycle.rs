//! Install and activate.

use dashcache_core::{Error, Request, Response};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::sync::atomic::Ordering;
use url::Url;

use super::Worker;

/// Lifecycle position of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    /// Install failed; this worker never serves.
    Redundant,
}

impl Worker {
    /// Seed the current store with the static manifest.
    ///
    /// A store for this version that already holds every manifest entry is
    /// reused as is, so a restart needs no network. Otherwise every entry is
    /// fetched before anything is written; a single transport failure or
    /// non-2xx answer fails the whole install and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` naming the first entry that failed.
    pub async fn install(&self) -> Result<(), Error> {
        self.set_state(WorkerState::Installing);

        match self.installed_manifest().await {
            Ok(true) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                tracing::info!(cache = %self.cache_name, entries = self.manifest.len(), "reusing installed cache");
                self.set_state(WorkerState::Installed);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(cache = %self.cache_name, error = %e, "could not inspect existing cache, reinstalling"),
        }

        match self.seed_manifest().await {
            Ok(count) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                tracing::info!(cache = %self.cache_name, entries = count, "static manifest cached");
                self.set_state(WorkerState::Installed);
                Ok(())
            }
            Err(e) => {
                tracing::error!(cache = %self.cache_name, error = %e, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Whether this version's store exists and holds the whole manifest.
    async fn installed_manifest(&self) -> Result<bool, Error> {
        if !self.db.has_store(&self.cache_name).await? {
            return Ok(false);
        }
        let store = self.current_store();
        for url in &self.manifest {
            if !store.contains(&Request::get(url.clone())).await? {
                tracing::debug!(%url, "installed cache lacks manifest entry");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn seed_manifest(&self) -> Result<usize, Error> {
        let store = self.db.open_store(&self.cache_name).await?;

        let fetched = try_join_all(self.manifest.iter().map(|url| self.fetch_manifest_entry(url))).await?;

        for (request, response) in &fetched {
            store
                .put(request, response)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {}", request.url, e)))?;
        }

        Ok(fetched.len())
    }

    async fn fetch_manifest_entry(&self, url: &Url) -> Result<(Request, Response), Error> {
        let request = Request::get(url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;

        if !response.is_success() {
            return Err(Error::InstallFailed(format!("{url}: status {}", response.status.as_u16())));
        }

        Ok((request, response))
    }

    /// Delete every store not named for this version, then claim open pages.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.set_state(WorkerState::Activating);

        let mut deleted = Vec::new();
        for name in self.db.store_names().await? {
            if name != self.cache_name && self.db.delete_store(&name).await? {
                tracing::info!(store = %name, "deleted outdated cache");
                deleted.push(name);
            }
        }

        let claimed = self.clients.claim().await;
        tracing::debug!(pages = claimed, "claimed open pages");

        self.set_state(WorkerState::Active);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::hub::PageEvent;
    use http::StatusCode;

    #[tokio::test]
    async fn test_install_seeds_manifest() {
        let harness = Harness::new().await;
        harness.serve_manifest();

        harness.worker.install().await.unwrap();

        assert_eq!(harness.worker.state(), WorkerState::Installed);
        assert!(harness.worker.skip_waiting());
        assert_eq!(harness.store().count().await.unwrap(), 3);
        assert_eq!(harness.network.call_count(), 3);

        let keys = harness.store().keys().await.unwrap();
        assert!(keys.iter().any(|k| k.url == url("/static/css/style.css")));
        assert!(keys.iter().any(|k| k.url.starts_with("https://cdn.jsdelivr.net/")));
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let harness = Harness::new().await;
        harness.serve_manifest();
        harness.network.respond(
            &url("/static/css/style.css"),
            Response::new(StatusCode::NOT_FOUND, Default::default(), "missing"),
        );

        let err = harness.worker.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed(ref msg) if msg.contains("style.css")), "{err}");
        assert_eq!(harness.worker.state(), WorkerState::Redundant);
        assert!(!harness.worker.skip_waiting());
        assert_eq!(harness.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let harness = Harness::new().await;
        harness.network.set_offline(true);

        let result = harness.worker.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(harness.worker.state(), WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_restart_reuses_installed_cache_offline() {
        let first = Harness::started().await;
        let restarted = first.reopen();
        restarted.network.set_offline(true);

        restarted.worker.install().await.unwrap();
        restarted.worker.activate().await.unwrap();

        assert_eq!(restarted.worker.state(), WorkerState::Active);
        assert!(restarted.worker.skip_waiting());
        assert_eq!(restarted.network.call_count(), 0);
        assert_eq!(restarted.store().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_restart_refetches_incomplete_cache() {
        let first = Harness::started().await;
        let style = Request::get(Url::parse(&url("/static/css/style.css")).unwrap());
        assert!(first.store().delete(&style.cache_key()).await.unwrap());

        let restarted = first.reopen();
        restarted.serve_manifest();
        restarted.worker.install().await.unwrap();

        assert_eq!(restarted.network.call_count(), 3);
        assert!(restarted.store().contains(&style).await.unwrap());

        let offline = first.reopen();
        first.store().delete(&style.cache_key()).await.unwrap();
        offline.network.set_offline(true);
        assert!(matches!(offline.worker.install().await, Err(Error::InstallFailed(_))));
        assert_eq!(offline.worker.state(), WorkerState::Redundant);
        assert_eq!(offline.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_activate_removes_previous_versions() {
        let harness = Harness::new().await;
        let old = harness.db.open_store("stock-dashboard-v1.1.0").await.unwrap();
        let quote = Request::get(Url::parse(&url("/api/stock/AAPL")).unwrap());
        old.put(&quote, &Response::with_content_type(StatusCode::OK, "application/json", "{}"))
            .await
            .unwrap();
        harness.db.open_store("unrelated-cache").await.unwrap();

        harness.serve_manifest();
        harness.worker.install().await.unwrap();
        let deleted = harness.worker.activate().await.unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(harness.db.store_names().await.unwrap(), vec!["stock-dashboard-v1.2.0".to_string()]);
        assert_eq!(old.count().await.unwrap(), 0);
        assert_eq!(harness.worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_activate_claims_open_pages() {
        let harness = Harness::new().await;
        let (_, mut events) = harness.hub.register(Url::parse(&url("/crypto")).unwrap());

        harness.serve_manifest();
        harness.worker.install().await.unwrap();
        harness.worker.activate().await.unwrap();

        assert_eq!(events.recv().await, Some(PageEvent::ControllerChange));
    }

    #[tokio::test]
    async fn test_activate_with_no_previous_stores() {
        let harness = Harness::started().await;
        let deleted = harness.worker.activate().await.unwrap();
        assert!(deleted.is_empty());
        assert_eq!(harness.store().count().await.unwrap(), 3);
    }
}
