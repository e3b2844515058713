//! Transport primitives: the request/response descriptors the client speaks and the
//! [`Transport`] seam that performs the actual exchange.
//!
//! The client never talks to an HTTP stack directly. Callers hand an implementation of
//! [`Transport`] (typically behind `Arc<T>`) to [`AuthClient`](crate::client::AuthClient);
//! [`ReqwestTransport`] is provided behind the default `reqwest` feature. Transports only see
//! fully formed requests: decoration, classification, and refresh coordination all happen
//! above this layer.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one request.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can serve every
/// concurrent caller of a client. A non-2xx status is a successful exchange; only failures
/// where no response arrived map to [`TransportError`].
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the server's response.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Immutable descriptor of an outgoing request.
///
/// Besides the wire fields it carries a `retried` marker that transports never serialize. The
/// marker is set only by the retry path, so a request can be resubmitted after a refresh at
/// most once.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	url: Url,
	headers: HeaderMap,
	body: Vec<u8>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new(), retried: false }
	}

	/// Adds (or replaces) a header.
	pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type: application/json`.
	pub fn with_json<T>(self, payload: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(payload).map_err(crate::error::ConfigError::from)?;

		Ok(self
			.with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(body))
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Request headers, including `Authorization` once decorated.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Returns `true` once the request has been resubmitted after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	pub(crate) fn mark_retried(mut self) -> Self {
		self.retried = true;

		self
	}
}

/// Response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiResponse {
	const PREVIEW_LIMIT: usize = 256;

	/// Assembles a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// Response status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Lossy UTF-8 rendering of the body, truncated for diagnostics.
	pub fn body_preview(&self) -> String {
		let text = String::from_utf8_lossy(&self.body);
		let trimmed = text.trim();

		match trimmed.char_indices().nth(Self::PREVIEW_LIMIT) {
			Some((idx, _)) => format!("{}...", &trimmed[..idx]),
			None => trimmed.to_owned(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose every exchange (API and refresh calls alike) is bounded by
	/// `timeout`.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().timeout(timeout).build()?))
	}

	async fn execute(
		client: ReqwestClient,
		request: ApiRequest,
	) -> Result<ApiResponse, TransportError> {
		let ApiRequest { method, url, headers, body, .. } = request;
		let mut builder = client.request(method, url).headers(headers);

		if !body.is_empty() {
			builder = builder.body(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await?.to_vec();

		Ok(ApiResponse::new(status, headers, body))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(Self::execute(client, request))
	}
}
