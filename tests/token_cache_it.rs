// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime, macros};
// self
use hotmart_proxy::{
	auth::{Secret, TokenCache},
	error::{AuthError, Error},
	http::ReqwestHttpClient,
	url::Url,
};

const CLIENT_ID: &str = "client-id";
const CLIENT_SECRET: &str = "client-secret";
const FETCHED_AT: OffsetDateTime = macros::datetime!(2025-06-01 12:00 UTC);

fn build_cache(server: &MockServer) -> TokenCache {
	TokenCache::new(
		ReqwestHttpClient::default(),
		Url::parse(&server.url("/oauth/token")).expect("Mock token endpoint should parse."),
		Some(CLIENT_ID.into()),
		Some(Secret::new(CLIENT_SECRET)),
	)
}

#[tokio::test]
async fn token_request_uses_client_credentials_form() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.header("accept", "application/json")
				.body_includes("grant_type=client_credentials")
				.body_includes("client_id=client-id")
				.body_includes("client_secret=client-secret");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"fresh-token\",\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let token = cache.ensure_token().await.expect("Token request should succeed.");

	assert_eq!(token.expose(), "fresh-token");

	mock.assert_async().await;
}

#[tokio::test]
async fn cached_token_is_reused_until_expiry_margin() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"cached-token\",\"expires_in\":3600}");
		})
		.await;
	// Expiry lands at fetch time + 3600s - 60s.
	let expires_at = FETCHED_AT + Duration::seconds(3540);
	let first =
		cache.ensure_token_at(FETCHED_AT).await.expect("Initial token request should succeed.");
	let before_expiry = cache
		.ensure_token_at(expires_at - Duration::seconds(1))
		.await
		.expect("Cached token lookup should succeed.");

	assert_eq!(first.expose(), "cached-token");
	assert_eq!(before_expiry.expose(), "cached-token");

	mock.assert_calls_async(1).await;

	cache
		.ensure_token_at(expires_at + Duration::seconds(1))
		.await
		.expect("Refresh after expiry should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn refresh_replaces_the_cached_token() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mut first_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"access_token\":\"first\",\"expires_in\":120}");
		})
		.await;
	let first = cache.ensure_token_at(FETCHED_AT).await.expect("First fetch should succeed.");

	first_mock.delete_async().await;

	let second_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"access_token\":\"second\",\"expires_in\":120}");
		})
		.await;
	let later = FETCHED_AT + Duration::seconds(61);
	let second = cache.ensure_token_at(later).await.expect("Second fetch should succeed.");
	let reused = cache
		.ensure_token_at(later + Duration::seconds(30))
		.await
		.expect("Replacement token should be cached.");

	assert_eq!(first.expose(), "first");
	assert_eq!(second.expose(), "second");
	assert_eq!(reused.expose(), "second");

	second_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn token_endpoint_failure_surfaces_status_and_body() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(401).body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let err = cache.ensure_token().await.expect_err("Rejected credentials should fail.");

	match err {
		Error::Auth(AuthError::TokenEndpoint { status, body }) => {
			assert_eq!(status, 401);
			assert_eq!(body, "{\"error\":\"invalid_client\"}");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	mock.assert_async().await;
}

#[tokio::test]
async fn failed_fetch_is_not_cached() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(503).body("maintenance");
		})
		.await;

	cache.ensure_token().await.expect_err("First attempt should fail.");
	cache.ensure_token().await.expect_err("Second attempt should fail again.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_token_responses_are_rejected() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mut html = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("<html>blocked</html>");
		})
		.await;
	let err = cache.ensure_token().await.expect_err("HTML bodies should be rejected.");

	assert!(matches!(
		err,
		Error::Auth(AuthError::TokenResponseParse { ref body, .. }) if body == "<html>blocked</html>"
	));

	html.delete_async().await;

	let _missing = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"token_type\":\"bearer\",\"expires_in\":3600}");
		})
		.await;
	let err = cache.ensure_token().await.expect_err("Responses without a token should fail.");

	assert!(matches!(err, Error::Auth(AuthError::MissingAccessToken)));
	assert_eq!(err.to_string(), "OAuth response missing access_token");
}

#[tokio::test]
async fn missing_lifetime_is_not_reused() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"access_token\":\"short-lived\"}");
		})
		.await;

	cache.ensure_token_at(FETCHED_AT).await.expect("First fetch should succeed.");
	cache.ensure_token_at(FETCHED_AT).await.expect("Second fetch should succeed.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn out_of_range_lifetimes_are_clamped() {
	let server = MockServer::start_async().await;
	let cache = build_cache(&server);
	let mut huge = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"access_token\":\"long-lived\",\"expires_in\":1e20}");
		})
		.await;

	cache.ensure_token().await.expect("Huge lifetimes should not fail the fetch.");
	cache.ensure_token().await.expect("Clamped credential should be reused.");

	huge.assert_calls_async(1).await;
	huge.delete_async().await;

	let cache = build_cache(&server);
	let negative = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).body("{\"access_token\":\"stale\",\"expires_in\":-1e20}");
		})
		.await;

	cache.ensure_token().await.expect("Negative lifetimes should not fail the fetch.");
	cache.ensure_token().await.expect("Expired credential should be refetched.");

	negative.assert_calls_async(2).await;
}
