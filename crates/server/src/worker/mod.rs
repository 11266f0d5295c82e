//! The offline cache manager.
//!
//! A [`Worker`] owns the current versioned store and drives it through its
//! lifecycle: install seeds the static manifest, activate drops every other
//! version, then fetches, page messages, pushes and notification clicks are
//! served until shutdown.

pub mod control;
pub mod host;
pub mod lifecycle;
pub mod lifetime;
pub mod push;
pub mod router;
pub mod sweeper;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashcache_client::Network;
use dashcache_core::manifest::resolve_manifest;
use dashcache_core::{AppConfig, CacheDb, Classifier, Error, Store};
use tokio::sync::watch;
use url::Url;

pub use host::{Clients, Notifier, PageId, PageInfo};
pub use lifecycle::WorkerState;
pub use push::ClickOutcome;
pub use sweeper::spawn_sweeper;

use lifetime::Lifetime;

pub struct Worker {
    db: CacheDb,
    cache_name: String,
    version: String,
    origin: Url,
    classifier: Classifier,
    manifest: Vec<Url>,
    ticker_endpoints: Vec<String>,
    api_max_age: chrono::Duration,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
    lifetime: Lifetime,
}

impl Worker {
    /// Build a worker in the `Parsed` state.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the origin or a manifest entry does not
    /// resolve.
    pub fn new(
        config: &AppConfig, db: CacheDb, network: Arc<dyn Network>, clients: Arc<dyn Clients>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = resolve_manifest(&origin, &config.static_manifest)?;
        let classifier = Classifier::new(origin.clone(), config.api_paths.clone(), config.cross_origin_policy)
            .with_manifest_hosts(manifest.iter());
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self {
            db,
            cache_name: config.cache_name(),
            version: config.cache_version.clone(),
            origin,
            classifier,
            manifest,
            ticker_endpoints: config.ticker_endpoints.clone(),
            api_max_age: config.api_max_age(),
            network,
            clients,
            notifier,
            state,
            skip_waiting: AtomicBool::new(false),
            lifetime: Lifetime::new(),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Whether install asked to activate without waiting for old pages.
    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Handle to the current version's store. Not created until first write.
    fn current_store(&self) -> Store {
        self.db.store(&self.cache_name)
    }

    fn set_state(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        tracing::info!(from = ?previous, to = ?next, cache = %self.cache_name, "worker state changed");
    }
}
