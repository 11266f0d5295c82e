//! Static manifest and per-ticker endpoint templates.

use url::Url;

use crate::Error;

/// Assets fetched into the store at install time.
///
/// Relative entries are resolved against the dashboard origin; third-party
/// entries are version-pinned by URL.
pub const DEFAULT_STATIC_MANIFEST: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/app.js",
    "/static/js/crypto.js",
    "/static/js/oracle.js",
    "/static/js/portfolio.js",
    "/static/js/websocket.js",
    "/static/manifest.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
    "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
];

/// Placeholder substituted with the ticker symbol.
pub const TICKER_PLACEHOLDER: &str = "{ticker}";

/// Endpoints pre-warmed by `CACHE_TICKER`.
pub const DEFAULT_TICKER_ENDPOINTS: &[&str] = &["/api/stock/{ticker}", "/api/predict/{ticker}", "/api/oracle/{ticker}"];

/// Resolve a manifest entry (absolute or origin-relative) to an absolute URL.
pub fn resolve_entry(origin: &Url, entry: &str) -> Result<Url, Error> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(Error::InvalidUrl("empty manifest entry".into()));
    }
    origin
        .join(entry)
        .map_err(|e| Error::InvalidUrl(format!("{entry}: {e}")))
}

/// Resolve every manifest entry, preserving order.
pub fn resolve_manifest(origin: &Url, entries: &[String]) -> Result<Vec<Url>, Error> {
    entries.iter().map(|entry| resolve_entry(origin, entry)).collect()
}

/// Normalize a ticker symbol: trimmed and uppercased.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the symbol is empty, longer than 15
/// characters, or contains anything other than ASCII letters, digits, `.`,
/// `-`, `^` or `=`.
pub fn normalize_ticker(ticker: &str) -> Result<String, Error> {
    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(Error::InvalidInput("ticker cannot be empty".into()));
    }
    if ticker.len() > 15 {
        return Err(Error::InvalidInput(format!("ticker too long: {ticker}")));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(Error::InvalidInput(format!("invalid ticker: {ticker}")));
    }
    Ok(ticker)
}

/// Expand the endpoint templates for one (already normalized) ticker.
pub fn ticker_urls(origin: &Url, templates: &[String], ticker: &str) -> Result<Vec<Url>, Error> {
    templates
        .iter()
        .map(|template| resolve_entry(origin, &template.replace(TICKER_PLACEHOLDER, ticker)))
        .collect()
}
