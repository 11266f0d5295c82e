//! Request and response values exchanged across the fetch boundary.
//!
//! Both types own their body as [`Bytes`]. A response that has to be both
//! stored and returned is cloned first; the stored copy and the returned copy
//! are independent values.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use url::Url;

use crate::Error;
use crate::cache::CacheKey;

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// Shorthand for a bodiless GET.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Whether the `Accept` header admits an HTML document.
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/html"))
    }

    /// Identity under which this request is stored: method plus absolute URL
    /// without fragment.
    pub fn cache_key(&self) -> CacheKey {
        let mut url = self.url.clone();
        url.set_fragment(None);
        CacheKey { method: self.method.as_str().to_string(), url: url.to_string() }
    }
}

/// A response, either fresh from the network, replayed from the cache, or
/// synthesized while offline.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Response with a single `content-type` header.
    pub fn with_content_type(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::new(status, headers, body)
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// The `date` header, if present and parseable.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get(header::DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
    }

    /// Headers as ordered name/value pairs, skipping values that are not
    /// valid UTF-8.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect()
    }

    /// Rebuild a response from stored parts.
    pub fn from_parts(status: u16, pairs: Vec<(String, String)>, body: impl Into<Bytes>) -> Result<Self, Error> {
        let status = StatusCode::from_u16(status).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(Self::new(status, headers, body))
    }
}

/// Parse an HTTP `date` value (IMF-fixdate or any RFC 2822 form).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as an IMF-fixdate `date` header value.
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_accepts_html() {
        let req = Request::get(url("http://localhost:5000/")).with_header(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        );
        assert!(req.accepts_html());

        let req = Request::get(url("http://localhost:5000/api/stock/AAPL"))
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!req.accepts_html());

        assert!(!Request::get(url("http://localhost:5000/")).accepts_html());
    }

    #[test]
    fn test_cache_key_drops_fragment_keeps_query() {
        let req = Request::get(url("http://localhost:5000/crypto?range=1d#chart"));
        let key = req.cache_key();
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "http://localhost:5000/crypto?range=1d");
    }

    #[test]
    fn test_parse_http_date_imf_fixdate() {
        let parsed = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
    }

    #[test]
    fn test_parse_http_date_garbage() {
        assert!(parse_http_date("yesterday").is_none());
        assert!(parse_http_date("").is_none());
    }

    #[test]
    fn test_format_then_parse_date() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(format_http_date(at), "Sat, 14 Mar 2026 15:09:26 GMT");
        assert_eq!(parse_http_date(&format_http_date(at)), Some(at));
    }

    #[test]
    fn test_response_date_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::DATE, HeaderValue::from_static("Sun, 06 Nov 1994 08:49:37 GMT"));
        let resp = Response::new(StatusCode::OK, headers, "{}");
        assert!(resp.date().is_some());

        let resp = Response::new(StatusCode::OK, HeaderMap::new(), "{}");
        assert!(resp.date().is_none());
    }

    #[test]
    fn test_from_parts_preserves_repeated_headers() {
        let pairs = vec![
            ("set-cookie".to_string(), "a=1".to_string()),
            ("set-cookie".to_string(), "b=2".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let resp = Response::from_parts(200, pairs.clone(), "{}").unwrap();
        assert_eq!(resp.headers.get_all(header::SET_COOKIE).iter().count(), 2);
        assert_eq!(resp.header_pairs(), pairs);
    }

    #[test]
    fn test_from_parts_rejects_bad_status() {
        assert!(matches!(Response::from_parts(1000, vec![], ""), Err(Error::CorruptEntry(_))));
    }
}
