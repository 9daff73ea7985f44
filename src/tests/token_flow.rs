// End-to-end /token behaviour against a local identity provider stand-in.

#[cfg(test)]
mod test {

    use std::time::Duration;

    use axum::http::StatusCode;
    use chrono::{TimeDelta, Utc};
    use futures::future::join_all;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

    use crate::cache::token::Token;
    use crate::cache::token_cache::{CacheEntry, CACHE_KEY};
    use crate::pipeline::{CORRELATION_HEADER, TRACE_HEADER};
    use crate::tests::common::{
        build_reqwest_client, closed_port_url, test_settings, token_body, MockProvider, RunningVendor,
    };

    const FORBIDDEN_BODY: &str = r#"{"status":403,"message":"unexpected error received, try again later"}"#;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn first_request_fetches_and_second_is_served_from_cache() {
        let provider = MockProvider::issuing("abc", 3600).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;
        let client = build_reqwest_client();

        let resp = client
            .get(vendor.url("/token"))
            .header(TRACE_HEADER, "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[AUTHORIZATION], "Bearer abc");
        assert_eq!(resp.headers()[CORRELATION_HEADER], "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(resp.text().await.unwrap(), "OK");
        assert_eq!(provider.calls(), 1);

        let cached = vendor.state.cache.read(CACHE_KEY).await.expect("token cached");
        assert_eq!(cached.token.access_token, "abc");

        let resp = client.get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[AUTHORIZATION], "Bearer abc");
        assert_eq!(provider.calls(), 1, "second request must not reach the provider");

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn upstream_server_error_yields_generic_403_and_nothing_is_cached() {
        let provider = MockProvider::spawn(|_| (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_owned()), Duration::ZERO).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;
        let client = build_reqwest_client();

        let resp = client.get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
        assert!(resp.headers().get(AUTHORIZATION).is_none());
        assert_eq!(resp.text().await.unwrap(), FORBIDDEN_BODY);

        // 5xx is retried up to the configured attempt count
        assert_eq!(provider.calls(), 3);
        assert!(vendor.state.cache.read(CACHE_KEY).await.is_none());

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rejected_credentials_are_not_retried() {
        let provider = MockProvider::spawn(|_| (StatusCode::UNAUTHORIZED, "invalid_client".to_owned()), Duration::ZERO).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;

        let resp = build_reqwest_client().get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = resp.text().await.unwrap();
        assert_eq!(body, FORBIDDEN_BODY);
        assert!(!body.contains("invalid_client"));
        assert_eq!(provider.calls(), 1);

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn malformed_provider_body_is_a_hard_error() {
        let provider = MockProvider::spawn(|_| (StatusCode::OK, "<html>maintenance</html>".to_owned()), Duration::ZERO).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;

        let resp = build_reqwest_client().get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.text().await.unwrap(), FORBIDDEN_BODY);
        assert_eq!(provider.calls(), 1);
        assert!(vendor.state.cache.read(CACHE_KEY).await.is_none());

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unreachable_provider_yields_503() {
        let vendor = RunningVendor::start(test_settings(&closed_port_url().await, &[])).await;

        let resp = build_reqwest_client().get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], 503);
        assert_eq!(body["message"], "token provider unavailable, try again later");

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn expired_entry_is_replaced_with_one_fetch() {
        let provider = MockProvider::issuing("fresh", 3600).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;

        let stale = Token {
            access_token: "stale".into(),
            scope: "all-apis".into(),
            token_type: "Bearer".into(),
            expires_in: 60,
        };
        let fetched_at = Utc::now() - TimeDelta::seconds(120);
        // store TTL still running, entry expiry already passed
        vendor
            .state
            .cache
            .write(CACHE_KEY, CacheEntry::new(stale, fetched_at, 0), Duration::from_secs(3600))
            .await;

        let resp = build_reqwest_client().get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[AUTHORIZATION], "Bearer fresh");
        assert_eq!(provider.calls(), 1);

        let cached = vendor.state.cache.read(CACHE_KEY).await.unwrap();
        assert_eq!(cached.token.access_token, "fresh");

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_upstream_call() {
        let provider = MockProvider::spawn(
            |_| (StatusCode::OK, token_body("herd", 3600)),
            Duration::from_millis(300),
        )
        .await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;
        let client = build_reqwest_client();

        let requests = (0..16).map(|_| client.get(vendor.url("/token")).send());
        let responses = join_all(requests).await;

        for resp in responses {
            let resp = resp.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[AUTHORIZATION], "Bearer herd");
        }
        assert_eq!(provider.calls(), 1);

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn token_without_lifetime_is_served_but_not_cached() {
        let provider = MockProvider::issuing("ephemeral", 0).await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;
        let client = build_reqwest_client();

        for expected_calls in 1..=2 {
            let resp = client.get(vendor.url("/token")).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[AUTHORIZATION], "Bearer ephemeral");
            assert_eq!(provider.calls(), expected_calls);
        }
        assert!(vendor.state.cache.read(CACHE_KEY).await.is_none());

        vendor.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn token_inside_refresh_window_is_served_while_refreshing() {
        let provider = MockProvider::spawn(
            |n| (StatusCode::OK, token_body(&format!("tok-{}", n), 3600)),
            Duration::ZERO,
        )
        .await;
        let vendor = RunningVendor::start(test_settings(&provider.url(), &[])).await;

        // cached an hour ago with an hour and a minute of lifetime: valid, inside the window
        let aging = Token {
            access_token: "aging".into(),
            scope: "all-apis".into(),
            token_type: "Bearer".into(),
            expires_in: 3660,
        };
        let entry = CacheEntry::new(aging, Utc::now() - TimeDelta::seconds(3600), 120);
        vendor.state.cache.write(CACHE_KEY, entry, Duration::from_secs(60)).await;

        let client = build_reqwest_client();
        let resp = client.get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.headers()[AUTHORIZATION], "Bearer aging");

        let mut refreshed = None;
        for _ in 0..50 {
            if let Some(entry) = vendor.state.cache.read(CACHE_KEY).await {
                if entry.token.access_token != "aging" {
                    refreshed = Some(entry.token.access_token);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(refreshed.as_deref(), Some("tok-0"));
        assert_eq!(provider.calls(), 1);

        let resp = client.get(vendor.url("/token")).send().await.unwrap();
        assert_eq!(resp.headers()[AUTHORIZATION], "Bearer tok-0");
        assert_eq!(provider.calls(), 1);

        vendor.stop().await.unwrap();
    }
}
