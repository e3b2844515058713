// std
use std::{env, fs, path::PathBuf, process, time::Duration as StdDuration};
// self
use refresh_broker::{
	_preludet::*,
	auth::{TokenPair, TokenSecret},
	client::AuthClient,
	config::ClientConfig,
	http::ApiRequest,
	store::{FileStore, MemoryStore, TokenStore},
};

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"refresh_broker_store_it_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

#[tokio::test]
async fn memory_store_pair_lifecycle() {
	let backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn TokenStore> = backend.clone();

	assert!(store.is_cleared().await.expect("Reading an empty store should succeed."));

	store
		.save_pair(TokenPair::new(TokenSecret::new("T1"), Some(TokenSecret::new("R1"))))
		.await
		.expect("Saving the first pair should succeed.");
	store
		.save_pair(TokenPair::new(TokenSecret::new("T2"), None))
		.await
		.expect("Saving a non-rotated pair should succeed.");

	let access = store
		.access_token()
		.await
		.expect("Reading the access token should succeed.")
		.expect("Access token should be present.");
	let refresh = store
		.refresh_token()
		.await
		.expect("Reading the refresh token should succeed.")
		.expect("Refresh token should survive a non-rotating save.");

	assert_eq!(access.expose(), "T2");
	assert_eq!(refresh.expose(), "R1");

	store.clear().await.expect("Clearing should succeed.");
	store.clear().await.expect("Clearing an empty store should succeed.");

	assert!(store.is_cleared().await.expect("Reading a cleared store should succeed."));
	assert!(backend.snapshot().updated_at.is_some());
}

#[tokio::test]
async fn memory_store_clones_share_state() {
	let store = MemoryStore::default();
	let clone = store.clone();

	store
		.set_tokens(TokenSecret::new("T1"), Some(TokenSecret::new("R1")))
		.await
		.expect("Seeding the memory store should succeed.");

	let seen = clone
		.access_token()
		.await
		.expect("Reading through the clone should succeed.")
		.expect("Clone should observe the write.");

	assert_eq!(seen.expose(), "T1");
}

#[tokio::test]
async fn file_store_persists_rotation_across_reopen() {
	let path = temp_path("rotation");
	let transport = Arc::new(ScriptedTransport::new(|request: ApiRequest| async move {
		if request.url().path() == refresh_broker::config::DEFAULT_REFRESH_PATH {
			return Ok(json_response(200, r#"{"accessToken":"T2","refreshToken":"R2"}"#));
		}

		match bearer_of(&request).as_deref() {
			Some("Bearer T2") => Ok(json_response(204, "")),
			_ => Ok(json_response(401, "{}")),
		}
	}));

	{
		let store = Arc::new(FileStore::open(&path).expect("Failed to open file store."));
		let config = ClientConfig::builder(
			Url::parse(SCRIPTED_BASE_URL).expect("Scripted base URL should parse."),
		)
		.refresh_timeout(StdDuration::from_secs(5))
		.build()
		.expect("Client config should be valid.");
		let client = <AuthClient<ScriptedTransport>>::new(config, store, transport.clone());

		client
			.login(TokenPair::new(TokenSecret::new("T1"), Some(TokenSecret::new("R1"))))
			.await
			.expect("Login should persist the pair.");

		let response =
			client.send(scripted_get("/sync")).await.expect("Request should recover.");

		assert_eq!(response.status(), StatusCode::NO_CONTENT);
	}

	let reopened = FileStore::open(&path).expect("Failed to reopen file store.");
	let access = reopened
		.access_token()
		.await
		.expect("Reading the access token should succeed.")
		.expect("Access token should be persisted.");
	let refresh = reopened
		.refresh_token()
		.await
		.expect("Reading the refresh token should succeed.")
		.expect("Rotated refresh token should be persisted.");

	assert_eq!(access.expose(), "T2");
	assert_eq!(refresh.expose(), "R2");
	assert_eq!(transport.refresh_calls(), 1);

	fs::remove_file(&path).expect("Failed to remove temporary file store snapshot.");
}
