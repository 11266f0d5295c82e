//! Core types and shared functionality for dashcache.
//!
//! This crate provides:
//! - Versioned cache storage with a SQLite backend
//! - Request/response value types and the request classification rule
//! - Static manifest, control message and push payload types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod exchange;
pub mod manifest;
pub mod message;

pub use cache::{CacheDb, CacheKey, EntryStamp, Store};
pub use classify::{Classifier, CrossOriginPolicy, RequestClass};
pub use config::AppConfig;
pub use error::Error;
pub use exchange::{Request, Response};
pub use message::{CacheStatus, ControlMessage, NotificationOptions, PushPayload};
