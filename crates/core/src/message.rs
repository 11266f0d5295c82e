//! Page-facing message types: control messages, cache status, push payloads
//! and notification routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Control message sent by a page, as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Pre-warm the cache for one symbol's known endpoints.
    CacheTicker { ticker: String },
    /// Delete every store regardless of version.
    ClearCache,
    /// Re-fetch the static manifest into the current store.
    UpdateCache,
    /// Reply with a [`CacheStatus`] on the message's reply channel.
    GetCacheStatus,
}

impl ControlMessage {
    /// Parse a control message from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidMessage(e.to_string()))
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::CacheTicker { .. } => "CACHE_TICKER",
            ControlMessage::ClearCache => "CLEAR_CACHE",
            ControlMessage::UpdateCache => "UPDATE_CACHE",
            ControlMessage::GetCacheStatus => "GET_CACHE_STATUS",
        }
    }
}

/// Snapshot of the current store, returned for `GET_CACHE_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub cache_name: String,
    pub version: String,
    pub total_items: u64,
    pub static_items: u64,
    pub api_items: u64,
    pub timestamp: DateTime<Utc>,
}

/// Optional fields a push payload may carry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: Option<bool>,
    pub data: Option<serde_json::Value>,
}

impl PushPayload {
    /// Parse a push payload field by field.
    ///
    /// A payload that is not a JSON object yields the empty payload. Inside an
    /// object, fields of the wrong type are dropped and the rest are kept.
    pub fn parse(bytes: Option<&[u8]>) -> Self {
        let Some(bytes) = bytes.filter(|b| !b.iter().all(u8::is_ascii_whitespace)) else {
            return Self::default();
        };
        let fields = match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(serde_json::Value::Object(fields)) => fields,
            Ok(other) => {
                tracing::debug!(kind = json_kind(&other), "push payload is not an object, using default notification");
                return Self::default();
            }
            Err(e) => {
                tracing::debug!(error = %e, "push payload is not JSON, using default notification");
                return Self::default();
            }
        };

        let text = |name: &str| match fields.get(name) {
            Some(serde_json::Value::String(value)) => Some(value.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => {
                tracing::debug!(field = name, kind = json_kind(other), "ignoring ill-typed push field");
                None
            }
        };

        let require_interaction = match fields.get("requireInteraction") {
            Some(serde_json::Value::Bool(flag)) => Some(*flag),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => {
                tracing::debug!(field = "requireInteraction", kind = json_kind(other), "ignoring ill-typed push field");
                None
            }
        };

        Self {
            title: text("title"),
            body: text("body"),
            icon: text("icon"),
            badge: text("badge"),
            tag: text("tag"),
            require_interaction,
            data: fields.get("data").filter(|value| !value.is_null()).cloned(),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Action id that dismisses a notification without navigating.
pub const CLOSE_ACTION: &str = "close";

/// Fully resolved notification, ready to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub vibrate: Vec<u32>,
    pub data: serde_json::Value,
    pub actions: Vec<NotificationAction>,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            title: "Stock Dashboard".into(),
            body: "New market update available".into(),
            icon: "/static/icons/icon-192x192.png".into(),
            badge: "/static/icons/badge-72x72.png".into(),
            tag: "general".into(),
            require_interaction: false,
            vibrate: vec![100, 50, 100],
            data: serde_json::Value::Object(serde_json::Map::new()),
            actions: vec![
                NotificationAction { action: "explore".into(), title: "View Details".into() },
                NotificationAction { action: CLOSE_ACTION.into(), title: "Close".into() },
            ],
        }
    }
}

impl NotificationOptions {
    /// Merge a push payload over the defaults.
    pub fn from_push(payload: PushPayload) -> Self {
        let defaults = Self::default();
        Self {
            title: payload.title.unwrap_or(defaults.title),
            body: payload.body.unwrap_or(defaults.body),
            icon: payload.icon.unwrap_or(defaults.icon),
            badge: payload.badge.unwrap_or(defaults.badge),
            tag: payload.tag.unwrap_or(defaults.tag),
            require_interaction: payload.require_interaction.unwrap_or(defaults.require_interaction),
            data: payload.data.unwrap_or(defaults.data),
            ..defaults
        }
    }
}

/// Notification tag to in-app path.
pub const NOTIFICATION_ROUTES: &[(&str, &str)] = &[
    ("price-alert", "/?alert=price"),
    ("prediction-update", "/?update=prediction"),
    ("oracle-insight", "/?oracle=true"),
    ("crypto-update", "/crypto"),
    ("portfolio-update", "/portfolio"),
];

/// In-app path a notification click with this tag opens.
pub fn route_for_tag(tag: Option<&str>) -> &'static str {
    tag.and_then(|tag| NOTIFICATION_ROUTES.iter().find(|(t, _)| *t == tag))
        .map(|(_, path)| *path)
        .unwrap_or("/")
}
