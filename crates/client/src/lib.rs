//! Network side of dashcache.
//!
//! This crate provides the `Network` abstraction with its reqwest-backed
//! implementation, request URL resolution, the private-address guard for
//! cross-origin fetches, and the two caching strategies that combine the
//! network with the cache store.

pub mod fetch;
pub mod strategy;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use fetch::{FetchClient, FetchConfig, Network, resolve_request_url, strip_hop_by_hop};
pub use strategy::{Strategy, cache_first, network_first};
