//! Synthetic responses served when neither the network nor the cache can
//! satisfy a request. None of them is ever written to the store.

use dashcache_core::Response;
use http::StatusCode;

/// Self-contained offline page for document requests. It references no
/// cached asset so it renders even with an empty store.
const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline - Stock Dashboard</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         background: #0f172a; color: #e2e8f0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; }
  .card { max-width: 420px; padding: 2.5rem; border-radius: 12px; background: #1e293b; text-align: center;
          box-shadow: 0 10px 30px rgba(0, 0, 0, 0.4); }
  h1 { margin: 0 0 0.75rem; font-size: 1.5rem; }
  p { margin: 0 0 1.5rem; line-height: 1.5; color: #94a3b8; }
  button { padding: 0.7rem 1.6rem; border: 0; border-radius: 8px; background: #3b82f6; color: #fff;
           font-size: 1rem; cursor: pointer; }
  button:hover { background: #2563eb; }
</style>
</head>
<body>
<div class="card">
  <h1>You're offline</h1>
  <p>Live market data is unavailable right now. Cached panels will keep working; reconnect to refresh prices and predictions.</p>
  <button type="button" onclick="window.location.reload()">Try again</button>
</div>
</body>
</html>
"#;

/// Offline document for HTML navigations with no cached copy.
pub fn offline_page() -> Response {
    Response::with_content_type(StatusCode::OK, "text/html; charset=utf-8", OFFLINE_PAGE)
}

/// 503 for network-first requests with no cached copy.
pub fn service_unavailable() -> Response {
    Response::with_content_type(
        StatusCode::SERVICE_UNAVAILABLE,
        "application/json",
        r#"{"error":"offline","message":"Service unavailable while offline"}"#,
    )
}

/// 503 for cache-first assets that are neither cached nor reachable.
pub fn asset_unavailable() -> Response {
    Response::with_content_type(
        StatusCode::SERVICE_UNAVAILABLE,
        "text/plain; charset=utf-8",
        "Asset not available offline",
    )
}

/// 502 for pass-through (non-GET) requests the network could not deliver.
pub fn bad_gateway(reason: &str) -> Response {
    Response::with_content_type(StatusCode::BAD_GATEWAY, "text/plain; charset=utf-8", format!("Bad gateway: {reason}"))
}
