//! Request classification.
//!
//! Every intercepted GET is sorted into one of three classes which decide the
//! fetch strategy:
//!
//! - `Api`: path under one of the allow-listed `/api/...` prefixes
//! - `Static`: own-origin `/static/...`, a known asset extension, or a
//!   cross-origin host (subject to [`CrossOriginPolicy`])
//! - `Document`: everything else

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

/// File extensions treated as static assets regardless of path.
pub const ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2", "ttf", "eot",
];

/// API sub-paths served network-first.
pub const DEFAULT_API_PATHS: &[&str] = &[
    "/api/stock/",
    "/api/predict/",
    "/api/crypto/",
    "/api/oracle/",
    "/api/portfolio",
    "/api/sentiment/",
    "/api/market/",
];

/// Class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestClass {
    Api,
    Static,
    Document,
}

/// How requests to other origins are classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOriginPolicy {
    /// Every cross-origin request is a static asset (cache-first).
    #[default]
    CacheFirst,
    /// Only hosts named in the static manifest are static; other cross-origin
    /// requests are documents (network-first).
    ManifestHosts,
}

/// Pure URL classifier bound to the dashboard origin.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    api_paths: Vec<String>,
    policy: CrossOriginPolicy,
    manifest_hosts: HashSet<String>,
}

impl Classifier {
    pub fn new(origin: Url, api_paths: Vec<String>, policy: CrossOriginPolicy) -> Self {
        Self { origin, api_paths, policy, manifest_hosts: HashSet::new() }
    }

    /// Record the hosts of the static manifest (used by `ManifestHosts`).
    pub fn with_manifest_hosts<'a>(mut self, urls: impl IntoIterator<Item = &'a Url>) -> Self {
        let hosts = urls
            .into_iter()
            .filter(|url| !self.is_same_origin(url))
            .filter_map(|url| url.host_str().map(str::to_ascii_lowercase))
            .collect();
        self.manifest_hosts = hosts;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Classify a request URL.
    pub fn classify(&self, url: &Url) -> RequestClass {
        let path = url.path();

        if path.starts_with("/api/") && self.api_paths.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return RequestClass::Api;
        }

        if !self.is_same_origin(url) {
            return match self.policy {
                CrossOriginPolicy::CacheFirst => RequestClass::Static,
                CrossOriginPolicy::ManifestHosts => {
                    let host = url.host_str().map(str::to_ascii_lowercase).unwrap_or_default();
                    if self.manifest_hosts.contains(&host) { RequestClass::Static } else { RequestClass::Document }
                }
            };
        }

        if path.starts_with("/static/") || has_asset_extension(path) {
            return RequestClass::Static;
        }

        RequestClass::Document
    }
}

fn has_asset_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ASSET_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(policy: CrossOriginPolicy) -> Classifier {
        Classifier::new(
            Url::parse("http://localhost:5000").unwrap(),
            DEFAULT_API_PATHS.iter().map(|p| p.to_string()).collect(),
            policy,
        )
    }

    fn classify(url: &str) -> RequestClass {
        classifier(CrossOriginPolicy::CacheFirst).classify(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_api_paths() {
        assert_eq!(classify("http://localhost:5000/api/predict/AAPL"), RequestClass::Api);
        assert_eq!(classify("http://localhost:5000/api/stock/MSFT?range=1d"), RequestClass::Api);
        assert_eq!(classify("http://localhost:5000/api/portfolio"), RequestClass::Api);
    }

    #[test]
    fn test_unlisted_api_path_is_document() {
        assert_eq!(classify("http://localhost:5000/api/admin/reset"), RequestClass::Document);
    }

    #[test]
    fn test_api_prefix_checked_before_origin() {
        assert_eq!(classify("https://api.example.com/api/crypto/BTC"), RequestClass::Api);
    }

    #[test]
    fn test_static_paths_and_extensions() {
        assert_eq!(classify("http://localhost:5000/static/css/main.css"), RequestClass::Static);
        assert_eq!(classify("http://localhost:5000/static/manifest.json"), RequestClass::Static);
        assert_eq!(classify("http://localhost:5000/favicon.ico"), RequestClass::Static);
        assert_eq!(classify("http://localhost:5000/fonts/Inter.WOFF2"), RequestClass::Static);
    }

    #[test]
    fn test_documents() {
        assert_eq!(classify("http://localhost:5000/"), RequestClass::Document);
        assert_eq!(classify("http://localhost:5000/crypto"), RequestClass::Document);
        assert_eq!(classify("http://localhost:5000/portfolio?tab=history"), RequestClass::Document);
        assert_eq!(classify("http://localhost:5000/.css"), RequestClass::Document);
    }

    #[test]
    fn test_cross_origin_cache_first_policy() {
        assert_eq!(
            classify("https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js"),
            RequestClass::Static
        );
        assert_eq!(classify("https://news.example.com/headlines"), RequestClass::Static);
    }

    #[test]
    fn test_cross_origin_manifest_hosts_policy() {
        let manifest = [
            Url::parse("https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css").unwrap(),
            Url::parse("http://localhost:5000/static/js/app.js").unwrap(),
        ];
        let classifier = classifier(CrossOriginPolicy::ManifestHosts).with_manifest_hosts(manifest.iter());

        let cdn = Url::parse("https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js").unwrap();
        let other = Url::parse("https://news.example.com/headlines").unwrap();
        assert_eq!(classifier.classify(&cdn), RequestClass::Static);
        assert_eq!(classifier.classify(&other), RequestClass::Document);
    }

    #[test]
    fn test_same_host_other_port_is_cross_origin() {
        let classifier = classifier(CrossOriginPolicy::ManifestHosts);
        let url = Url::parse("http://localhost:8080/").unwrap();
        assert!(!classifier.is_same_origin(&url));
        assert_eq!(classifier.classify(&url), RequestClass::Document);
    }
}
