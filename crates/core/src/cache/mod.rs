//! SQLite-backed cache storage for intercepted responses.
//!
//! Mirrors the browser Cache Storage model: a set of named stores, each
//! mapping a request identity (method + URL) to the latest response.
//!
//! - Store names embed the deployment version; stale stores are deleted
//!   wholesale at activation
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Per-key atomic put/delete, no multi-key transactions
//! - Entries carry a revision so deletes can be made conditional on it

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::compute_request_key;
pub use store::{CacheKey, EntryStamp, Store};
