//! Fetch interception: classify, dispatch, fall back.

use std::sync::Arc;

use dashcache_client::Strategy;
use dashcache_client::strategy::bad_gateway;
use dashcache_core::{Request, RequestClass, Response};

use super::Worker;

impl Worker {
    /// Answer an intercepted request.
    ///
    /// The work runs as a lifetime-tracked task, so a caller that goes away
    /// does not cut a cache write short.
    pub async fn handle_fetch(self: &Arc<Self>, request: Request) -> Response {
        let worker = Arc::clone(self);
        let method = request.method.clone();
        let url = request.url.clone();

        match self.lifetime.wait_until(async move { worker.respond(request).await }).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%method, %url, error = %e, "fetch task failed");
                bad_gateway(e.code())
            }
        }
    }

    /// Class of a request URL under this worker's rules.
    pub fn classify(&self, request: &Request) -> RequestClass {
        self.classifier.classify(&request.url)
    }

    async fn respond(&self, request: Request) -> Response {
        if !request.is_get() {
            return self.pass_through(&request).await;
        }

        let class = self.classify(&request);
        let strategy = Strategy::for_class(class);
        tracing::debug!(url = %request.url, ?class, ?strategy, "routing request");

        strategy
            .handle(self.network.as_ref(), &self.current_store(), &request)
            .await
    }

    async fn pass_through(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %e, "pass-through failed");
                bad_gateway(e.code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use http::{HeaderValue, Method, StatusCode, header};
    use url::Url;

    fn get(path: &str) -> Request {
        Request::get(Url::parse(&url(path)).unwrap())
    }

    #[tokio::test]
    async fn test_api_request_goes_to_network_first() {
        let harness = Harness::started().await;
        let quote = url("/api/stock/AAPL");
        harness.network.respond_with(&quote, 200, "application/json", r#"{"price":1}"#);
        harness.worker.handle_fetch(get("/api/stock/AAPL")).await;

        harness.network.respond_with(&quote, 200, "application/json", r#"{"price":2}"#);
        let response = harness.worker.handle_fetch(get("/api/stock/AAPL")).await;

        assert_eq!(response.body.as_ref(), br#"{"price":2}"#);
        assert_eq!(harness.network.calls_to(&quote), 2);
    }

    #[tokio::test]
    async fn test_network_first_round_trip_is_identical() {
        let harness = Harness::started().await;
        let predict = url("/api/predict/AAPL");
        harness
            .network
            .respond_with(&predict, 200, "application/json", r#"{"symbol":"AAPL","forecast":[191.2,192.8]}"#);

        let served = harness.worker.handle_fetch(get("/api/predict/AAPL")).await;
        let stored = harness.store().match_request(&get("/api/predict/AAPL")).await.unwrap().unwrap();

        assert_eq!(stored.status, served.status);
        assert_eq!(stored.headers, served.headers);
        assert_eq!(stored.body, served.body);
    }

    #[tokio::test]
    async fn test_offline_prediction_served_from_cache() {
        let harness = Harness::started().await;
        let predict = url("/api/predict/AAPL");
        harness
            .network
            .respond_with(&predict, 200, "application/json", r#"{"symbol":"AAPL","forecast":[191.2]}"#);
        harness.worker.handle_fetch(get("/api/predict/AAPL")).await;

        harness.network.set_offline(true);
        let response = harness.worker.handle_fetch(get("/api/predict/AAPL")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref(), br#"{"symbol":"AAPL","forecast":[191.2]}"#);
    }

    #[tokio::test]
    async fn test_cdn_manifest_entry_served_without_network() {
        let harness = Harness::started().await;
        let chart = "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js";
        let before = harness.network.call_count();

        let response = harness.worker.handle_fetch(Request::get(Url::parse(chart).unwrap())).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("application/javascript"));
        assert_eq!(harness.network.call_count(), before);
        assert_eq!(harness.network.calls_to(chart), 1);
    }

    #[tokio::test]
    async fn test_cached_static_asset_skips_network() {
        let harness = Harness::started().await;
        let main_css = url("/static/css/main.css");
        harness.network.respond_with(&main_css, 200, "text/css", "body{}");
        harness.worker.handle_fetch(get("/static/css/main.css")).await;
        let before = harness.network.call_count();

        let response = harness.worker.handle_fetch(get("/static/css/main.css")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref(), b"body{}");
        assert_eq!(harness.network.call_count(), before);
    }

    #[tokio::test]
    async fn test_installed_asset_served_without_network() {
        let harness = Harness::started().await;
        let before = harness.network.call_count();

        let response = harness.worker.handle_fetch(get("/static/css/style.css")).await;

        assert_eq!(response.body.as_ref(), b"asset /static/css/style.css");
        assert_eq!(harness.network.call_count(), before);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let harness = Harness::started().await;
        harness.network.set_offline(true);
        let request = get("/portfolio")
            .with_header(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9"));

        let response = harness.worker.handle_fetch(request).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert!(harness.store().match_request(&get("/portfolio")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_root_document_served_from_install() {
        let harness = Harness::started().await;
        harness.network.set_offline(true);

        let response = harness.worker.handle_fetch(get("/")).await;
        assert_eq!(response.body.as_ref(), b"asset /");
    }

    #[tokio::test]
    async fn test_non_get_passes_through_uncached() {
        let harness = Harness::started().await;
        let orders = url("/api/portfolio/orders");
        harness.network.respond_with(&orders, 201, "application/json", r#"{"id":7}"#);
        let count = harness.store().count().await.unwrap();

        let request = Request::new(Method::POST, Url::parse(&orders).unwrap());
        let response = harness.worker.handle_fetch(request).await;

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(harness.store().count().await.unwrap(), count);
    }

    #[tokio::test]
    async fn test_non_get_offline_is_bad_gateway() {
        let harness = Harness::started().await;
        harness.network.set_offline(true);

        let request = Request::new(Method::POST, Url::parse(&url("/api/portfolio")).unwrap());
        let response = harness.worker.handle_fetch(request).await;

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_classify_uses_configured_paths() {
        let harness = Harness::new().await;
        assert_eq!(harness.worker.classify(&get("/api/crypto/BTC")), RequestClass::Api);
        assert_eq!(harness.worker.classify(&get("/static/js/app.js")), RequestClass::Static);
        assert_eq!(harness.worker.classify(&get("/oracle")), RequestClass::Document);
    }
}
