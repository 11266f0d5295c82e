//! Fetch strategies combining the network with a cache store.
//!
//! - network-first (API, documents): the network answers when it can and 2xx
//!   answers are written back; the cache is only consulted on failure.
//! - cache-first (static assets): a stored copy is served without touching
//!   the network; misses are fetched and stored.
//!
//! Cache failures never fail a request. They are logged and treated as a
//! miss.

pub mod fallback;

use dashcache_core::{Request, RequestClass, Response, Store};

use crate::fetch::Network;

pub use fallback::{asset_unavailable, bad_gateway, offline_page, service_unavailable};

/// Strategy applied to an intercepted GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
}

impl Strategy {
    pub fn for_class(class: RequestClass) -> Self {
        match class {
            RequestClass::Api | RequestClass::Document => Strategy::NetworkFirst,
            RequestClass::Static => Strategy::CacheFirst,
        }
    }

    pub async fn handle(self, network: &dyn Network, store: &Store, request: &Request) -> Response {
        match self {
            Strategy::NetworkFirst => network_first(network, store, request).await,
            Strategy::CacheFirst => cache_first(network, store, request).await,
        }
    }
}

/// Write a fetched response back to the store. The store serializes its own
/// copy of the body, so the caller still owns the response it returns.
async fn remember(store: &Store, request: &Request, response: &Response) {
    if let Err(e) = store.put(request, response).await {
        tracing::warn!(url = %request.url, error = %e, "failed to cache response");
    }
}

async fn lookup(store: &Store, request: &Request) -> Option<Response> {
    match store.match_request(request).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
            None
        }
    }
}

/// Network-first: fresh data when online, last known copy when not.
pub async fn network_first(network: &dyn Network, store: &Store, request: &Request) -> Response {
    match network.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                remember(store, request, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::info!(url = %request.url, error = %e, "network failed, trying cache");
            if let Some(cached) = lookup(store, request).await {
                return cached;
            }
            if request.accepts_html() { offline_page() } else { service_unavailable() }
        }
    }
}

/// Cache-first: stored copy if present, otherwise fetch and store.
pub async fn cache_first(network: &dyn Network, store: &Store, request: &Request) -> Response {
    if let Some(cached) = lookup(store, request).await {
        tracing::debug!(url = %request.url, "served from cache");
        return cached;
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                remember(store, request, &response).await;
            }
            response
        }
        Err(e) => {
            tracing::info!(url = %request.url, error = %e, "asset unavailable offline");
            asset_unavailable()
        }
    }
}
