//! Five concurrent requests hit an expired access token; one refresh call serves all of them.
//!
//! Run with `cargo run --example concurrent_refresh --features tracing`.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use color_eyre::Result;
// self
use refresh_broker::{
	auth::{TokenPair, TokenSecret},
	client::AuthClient,
	config::{ClientConfig, DEFAULT_REFRESH_PATH},
	error::TransportError,
	http::{ApiRequest, ApiResponse, Transport, TransportFuture},
	http_types::{HeaderMap, Method, StatusCode, header},
	store::MemoryStore,
	url::Url,
};

/// In-process API that only accepts the token minted by its own refresh endpoint.
#[derive(Default)]
struct DemoApi {
	refreshes: AtomicUsize,
}
impl DemoApi {
	async fn answer(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
		if request.url().path() == DEFAULT_REFRESH_PATH {
			self.refreshes.fetch_add(1, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(50)).await;

			return Ok(reply(StatusCode::OK, r#"{"accessToken":"T2","refreshToken":"R2"}"#));
		}

		let authorized = request
			.headers()
			.get(header::AUTHORIZATION)
			.is_some_and(|value| value.as_bytes() == b"Bearer T2");

		if authorized {
			Ok(reply(StatusCode::OK, r#"{"ok":true}"#))
		} else {
			Ok(reply(StatusCode::UNAUTHORIZED, r#"{"error":"token_expired"}"#))
		}
	}
}
impl Transport for DemoApi {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(self.answer(request))
	}
}

fn reply(status: StatusCode, body: &str) -> ApiResponse {
	ApiResponse::new(status, HeaderMap::new(), body.as_bytes().to_vec())
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let base = Url::parse("https://api.example.test")?;
	let config =
		ClientConfig::builder(base.clone()).refresh_timeout(Duration::from_secs(2)).build()?;
	let api = Arc::new(DemoApi::default());
	let client = Arc::new(<AuthClient<DemoApi>>::new(
		config,
		Arc::new(MemoryStore::default()),
		api.clone(),
	));
	let mut events = client.subscribe();

	client.login(TokenPair::new(TokenSecret::new("T1"), Some(TokenSecret::new("R1")))).await?;

	let tasks: Vec<_> = (0..5)
		.map(|i| {
			let client = client.clone();
			let url = base.join(&format!("/charts/{i}"));

			tokio::spawn(async move {
				let response = client.send(ApiRequest::new(Method::GET, url?)).await?;

				Ok::<_, color_eyre::Report>(response.status())
			})
		})
		.collect();

	for (i, task) in tasks.into_iter().enumerate() {
		println!("request {i}: {}", task.await??);
	}

	println!("refresh calls: {}", api.refreshes.load(Ordering::SeqCst));
	println!("coalesced waiters: {}", client.refresh_metrics().coalesced());

	client.logout().await;

	println!("session event: {:?}", events.recv().await?);

	Ok(())
}
