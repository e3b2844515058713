//! Bearer-token request client with single-flight refresh coordination: concurrent 401s share
//! one refresh call, waiters fan out on its result, and unrecoverable failures invalidate the
//! session.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod retry;
pub mod session;
pub mod sign;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
	use crate::{
		auth::{TokenPair, TokenSecret},
		client::AuthClient,
		config::ClientConfig,
		http::{ApiRequest, ApiResponse, Transport, TransportFuture},
		store::{MemoryStore, TokenStore},
	};

	/// Base URL used by scripted transports; never dialed.
	pub const SCRIPTED_BASE_URL: &str = "https://api.example.test";

	/// Canned reply produced by a [`ScriptedTransport`] handler.
	pub type ScriptedReply = Result<ApiResponse, crate::error::TransportError>;

	type ScriptedFuture = Pin<Box<dyn Future<Output = ScriptedReply> + Send>>;
	type Handler = dyn Fn(ApiRequest) -> ScriptedFuture + Send + Sync;

	/// In-process [`Transport`] that records every request and answers through a caller-supplied
	/// async handler.
	pub struct ScriptedTransport {
		handler: Box<Handler>,
		seen: Mutex<Vec<ApiRequest>>,
		refresh_calls: AtomicUsize,
	}
	impl ScriptedTransport {
		/// Wraps an async handler.
		pub fn new<F, Fut>(handler: F) -> Self
		where
			F: 'static + Send + Sync + Fn(ApiRequest) -> Fut,
			Fut: 'static + Send + Future<Output = ScriptedReply>,
		{
			let handler: Box<Handler> =
				Box::new(move |request| -> ScriptedFuture { Box::pin(handler(request)) });

			Self { handler, seen: Default::default(), refresh_calls: AtomicUsize::new(0) }
		}

		/// Returns every request observed so far, in submission order.
		pub fn requests(&self) -> Vec<ApiRequest> {
			self.seen.lock().clone()
		}

		/// Returns how many requests hit the refresh endpoint.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}
	}
	impl Transport for ScriptedTransport {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			if request.url().path() == crate::config::DEFAULT_REFRESH_PATH {
				self.refresh_calls.fetch_add(1, Ordering::SeqCst);
			}

			self.seen.lock().push(request.clone());

			(self.handler)(request)
		}
	}

	/// Builds a JSON response with the provided status.
	pub fn json_response(status: u16, body: &str) -> ApiResponse {
		let mut headers = HeaderMap::new();

		headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		ApiResponse::new(
			StatusCode::from_u16(status).expect("Status fixture should be a valid code."),
			headers,
			body.as_bytes().to_vec(),
		)
	}

	/// Returns the `Authorization` header value carried by `request`, if any.
	pub fn bearer_of(request: &ApiRequest) -> Option<String> {
		request
			.headers()
			.get(header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned)
	}

	/// Constructs an [`AuthClient`] over `transport` and a memory store seeded with `access` and
	/// `refresh`.
	pub async fn build_scripted_client<T>(
		transport: Arc<T>,
		access: &str,
		refresh: &str,
		refresh_timeout: std::time::Duration,
	) -> (AuthClient<T>, Arc<MemoryStore>)
	where
		T: Transport,
	{
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let config = ClientConfig::builder(
			Url::parse(SCRIPTED_BASE_URL).expect("Scripted base URL should parse."),
		)
		.refresh_timeout(refresh_timeout)
		.build()
		.expect("Scripted client config should be valid.");
		let client = AuthClient::new(config, store, transport);

		client
			.login(TokenPair::new(TokenSecret::new(access), Some(TokenSecret::new(refresh))))
			.await
			.expect("Seeding the memory store should succeed.");

		(client, store_backend)
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs an [`AuthClient`] rooted at `base_url` with an empty memory store and the
	/// reqwest transport used across integration tests.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (AuthClient<ReqwestTransport>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let config =
			ClientConfig::builder(Url::parse(base_url).expect("Mock base URL should parse."))
				.refresh_timeout(std::time::Duration::from_secs(5))
				.build()
				.expect("Reqwest test client config should be valid.");

		(AuthClient::new(config, store, test_reqwest_transport()), store_backend)
	}

	/// Builds a `GET` request against the scripted base URL.
	pub fn scripted_get(path: &str) -> ApiRequest {
		let url = Url::parse(SCRIPTED_BASE_URL)
			.and_then(|base| base.join(path))
			.expect("Scripted request URL should parse.");

		ApiRequest::new(Method::GET, url)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use ::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
