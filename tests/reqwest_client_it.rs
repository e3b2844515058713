#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use refresh_broker::{
	_preludet::*,
	auth::{TokenPair, TokenSecret},
	error::{Error, RefreshError},
	http::ApiRequest,
	http_types::Method,
	session::SessionEvent,
};

fn get(server: &MockServer, path: &str) -> ApiRequest {
	ApiRequest::new(
		Method::GET,
		Url::parse(&server.url(path)).expect("Mock request URL should parse successfully."),
	)
}

fn seed() -> TokenPair {
	TokenPair::new(TokenSecret::new("T1"), Some(TokenSecret::new("R1")))
}

#[tokio::test]
async fn expired_token_is_refreshed_over_http_and_rotated() {
	let server = MockServer::start_async().await;
	let (client, store) = build_reqwest_test_client(&server.base_url());

	client.login(seed()).await.expect("Seeding the memory store should succeed.");

	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer T1");
			then.status(401).header("content-type", "application/json").body("{}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "refreshToken": "R1" }));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"T2\",\"refreshToken\":\"R2\"}");
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer T2");
			then.status(200).header("content-type", "application/json").body("{\"id\":7}");
		})
		.await;
	let response = client.send(get(&server, "/me")).await.expect("Request should recover.");
	let body: serde_json::Value = response.json().expect("Response body should decode.");
	let snapshot = store.snapshot();

	stale.assert_async().await;
	refresh.assert_async().await;
	fresh.assert_async().await;

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body, serde_json::json!({ "id": 7 }));
	assert_eq!(snapshot.access_token.as_ref().map(TokenSecret::expose), Some("T2"));
	assert_eq!(snapshot.refresh_token.as_ref().map(TokenSecret::expose), Some("R2"));
}

#[tokio::test]
async fn rejected_refresh_clears_the_session() {
	let server = MockServer::start_async().await;
	let (client, store) = build_reqwest_test_client(&server.base_url());

	client.login(seed()).await.expect("Seeding the memory store should succeed.");

	let mut events = client.subscribe();
	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/charts");
			then.status(401).body("{}");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let (a, b, c) = tokio::join!(
		client.send(get(&server, "/charts")),
		client.send(get(&server, "/charts")),
		client.send(get(&server, "/charts")),
	);

	for result in [a, b, c] {
		let err = result.expect_err("A rejected refresh fails every request.");

		assert!(err.is_auth_failure());
		assert!(matches!(
			err.as_refresh_failure(),
			Some(RefreshError::Rejected { status: 400, .. } | RefreshError::MissingRefreshToken)
		));
	}

	// Requests that reach the coordinator after the session was cleared fail locally.
	refresh.assert_calls_async(1).await;
	api.assert_calls_async(3).await;

	assert!(store.snapshot().access_token.is_none());
	assert!(store.snapshot().refresh_token.is_none());
	assert_eq!(events.try_recv(), Ok(SessionEvent::Invalidated));
}

#[tokio::test]
async fn server_errors_pass_through_without_refresh() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(&server.base_url());

	client.login(seed()).await.expect("Seeding the memory store should succeed.");

	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/reports").header("authorization", "Bearer T1");
			then.status(500).body("upstream unavailable");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200).body("{\"accessToken\":\"T2\"}");
		})
		.await;
	let response =
		client.send(get(&server, "/reports")).await.expect("A 500 is handed back as a response.");

	api.assert_async().await;
	refresh.assert_calls_async(0).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(response.body_preview(), "upstream unavailable");
}

#[tokio::test]
async fn malformed_refresh_body_reports_the_failing_field() {
	let server = MockServer::start_async().await;
	let (client, _store) = build_reqwest_test_client(&server.base_url());

	client.login(seed()).await.expect("Seeding the memory store should succeed.");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/me");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":42}");
		})
		.await;

	let err = client.send(get(&server, "/me")).await.expect_err("Refresh body is malformed.");

	match err.as_refresh_failure() {
		Some(RefreshError::MalformedResponse { message }) => {
			assert!(message.contains("accessToken"), "Unexpected message: {message}.");
		},
		other => panic!("Unexpected refresh failure: {other:?}."),
	}
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
	let (client, store) = build_reqwest_test_client("http://127.0.0.1:9");

	client.login(seed()).await.expect("Seeding the memory store should succeed.");

	let request = ApiRequest::new(
		Method::GET,
		Url::parse("http://127.0.0.1:9/me").expect("Fixture URL should parse."),
	);
	let err = client.send(request).await.expect_err("Nothing listens on the discard port.");

	assert!(matches!(err, Error::Transport(_)));
	assert!(store.snapshot().access_token.is_some());
	assert_eq!(client.refresh_metrics().attempts(), 0);
}
