//! Client facade wiring decoration, classification, refresh coordination, retry, and session
//! invalidation behind one entry point.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use refresh_broker::{auth::{TokenPair, TokenSecret}, client::AuthClient, config::ClientConfig,
//! #     http::{ApiRequest, ReqwestTransport}, http_types::Method, store::MemoryStore, url::Url};
//! # async fn demo() -> refresh_broker::error::Result<()> {
//! let base = Url::parse("https://api.example.com").expect("static URL");
//! let config = ClientConfig::builder(base.clone()).build()?;
//! let client = <AuthClient<ReqwestTransport>>::new(
//! 	config,
//! 	Arc::new(MemoryStore::default()),
//! 	ReqwestTransport::default(),
//! );
//!
//! client.login(TokenPair::new(TokenSecret::new("T1"), Some(TokenSecret::new("R1")))).await?;
//!
//! let response = client
//! 	.send(ApiRequest::new(Method::GET, base.join("/me").expect("static path")))
//! 	.await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	classify::{self, Classification},
	config::ClientConfig,
	http::{ApiRequest, ApiResponse, Transport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_debug},
	refresh::{RefreshCoordinator, RefreshEndpoint, RefreshMetrics},
	retry::{self, RetryExecutor},
	session::{SessionEvent, SessionInvalidator},
	sign::{self, BearerSigner, RequestSigner},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestTransport>;

/// Bearer-token client that transparently refreshes expired access tokens.
///
/// Every request is signed with the token currently in the store. A first 401 enters the
/// [`RefreshCoordinator`]: concurrent 401s share one refresh call, and each request is then
/// resubmitted once with the new token. A failed refresh clears the store, emits
/// [`SessionEvent::Invalidated`], and rejects every participating request with
/// [`Error::RefreshFailure`].
///
/// Share one client (for example behind `Arc`) across tasks; coordination only spans callers
/// of the same instance.
pub struct AuthClient<T>
where
	T: ?Sized + Transport,
{
	config: ClientConfig,
	store: Arc<dyn TokenStore>,
	transport: Arc<T>,
	signer: Arc<dyn RequestSigner>,
	endpoint: RefreshEndpoint<T>,
	coordinator: RefreshCoordinator,
	invalidator: Arc<SessionInvalidator>,
	retry: RetryExecutor<T>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client over `store` and `transport`, signing with [`BearerSigner`].
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn TokenStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let transport = transport.into();
		let signer: Arc<dyn RequestSigner> = Arc::new(BearerSigner);
		let invalidator =
			Arc::new(SessionInvalidator::new(store.clone(), config.session_channel_capacity()));

		Self {
			endpoint: RefreshEndpoint::new(config.refresh_url().clone(), transport.clone()),
			coordinator: RefreshCoordinator::new(invalidator.clone(), config.refresh_timeout()),
			retry: RetryExecutor::new(transport.clone(), signer.clone()),
			config,
			store,
			transport,
			signer,
			invalidator,
		}
	}

	/// Replaces the request signer used for first attempts and retries.
	pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.retry = RetryExecutor::new(self.transport.clone(), signer.clone());
		self.signer = signer;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token store backing this client.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Transport used for API and refresh calls.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Refresh cycle counters.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Returns `true` while a refresh cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.coordinator.is_refreshing()
	}

	/// Number of requests waiting on the in-flight refresh cycle.
	pub fn refresh_waiters(&self) -> usize {
		self.coordinator.waiter_count()
	}

	/// Subscribes to session events such as [`SessionEvent::Invalidated`].
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.invalidator.subscribe()
	}

	/// Stores a freshly issued token pair, starting a new authenticated session.
	///
	/// A refresh still in flight for the previous session is discarded rather than overwriting
	/// this pair.
	pub async fn login(&self, pair: TokenPair) -> Result<()> {
		self.invalidator.establish(pair).await?;

		trace_debug!("Stored new token pair.");

		Ok(())
	}

	/// Clears the session. Returns `true` when tokens were present and an event was emitted.
	///
	/// A refresh in flight when this runs cannot restore the session: its cycle fails with
	/// [`RefreshError::Superseded`](crate::error::RefreshError::Superseded).
	pub async fn logout(&self) -> bool {
		self.invalidator.invalidate().await
	}

	/// Sends `request` with the current access token.
	///
	/// Non-401 statuses are returned as `Ok` untouched. A 401 is recovered through
	/// [`AuthClient::handle_auth_expired`]; the caller only sees it as
	/// [`Error::RefreshFailure`] or [`Error::AuthExhausted`] if recovery fails.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");
		let recorder = span.clone();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let signed =
					sign::decorate(self.store.as_ref(), self.signer.as_ref(), request.clone())
						.await?;
				let outcome = self.transport.send(signed.clone()).await;
				let class = classify::classify(&signed, outcome);

				recorder.record_classification(class.as_str());
				trace_debug!(
					method = %signed.method(),
					path = signed.url().path(),
					classification = class.as_str(),
					"Classified response."
				);

				match class {
					Classification::AuthExpired(_) => self.handle_auth_expired(request).await,
					class => retry::surface(&signed, class),
				}
			})
			.await;

		if let Ok(response) = &result {
			span.record_status(response.status());
		}

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Recovers a request that received its first 401.
	///
	/// Joins (or leads) the current refresh cycle, then resubmits `request` once with the new
	/// token. A request that was already retried fails with [`Error::AuthExhausted`] without
	/// touching the coordinator.
	pub async fn handle_auth_expired(&self, request: ApiRequest) -> Result<ApiResponse> {
		if request.is_retried() {
			return Err(Error::AuthExhausted {
				method: request.method().clone(),
				url: request.url().clone(),
			});
		}

		let token = self
			.coordinator
			.obtain_token(|| self.endpoint.refresh_and_store(&self.invalidator))
			.await?;

		self.retry.execute(request, &token).await
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestTransport> {
	/// Creates a client backed by a default [`ReqwestTransport`].
	pub fn with_reqwest(config: ClientConfig, store: Arc<dyn TokenStore>) -> Self {
		Self::new(config, store, ReqwestTransport::default())
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("config", &self.config)
			.field("coordinator", &self.coordinator)
			.field("invalidator", &self.invalidator)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::{
		_preludet::{
			ScriptedReply, ScriptedTransport, bearer_of, build_scripted_client, json_response,
			scripted_get,
		},
		auth::TokenSecret,
		error::{RefreshError, TransportError},
	};

	const TIMEOUT: StdDuration = StdDuration::from_secs(5);

	async fn accepts_t2(request: ApiRequest) -> ScriptedReply {
		if request.url().path() == crate::config::DEFAULT_REFRESH_PATH {
			return Ok(json_response(200, r#"{"accessToken":"T2","refreshToken":"R2"}"#));
		}

		match bearer_of(&request).as_deref() {
			Some("Bearer T2") => Ok(json_response(200, r#"{"ok":true}"#)),
			_ => Ok(json_response(401, r#"{"error":"expired"}"#)),
		}
	}

	#[tokio::test]
	async fn valid_token_skips_the_coordinator() {
		let transport = Arc::new(ScriptedTransport::new(accepts_t2));
		let (client, _store) = build_scripted_client(transport.clone(), "T2", "R1", TIMEOUT).await;
		let response = client.send(scripted_get("/me")).await.expect("Request should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.refresh_calls(), 0);
		assert_eq!(client.refresh_metrics().attempts(), 0);
	}

	#[tokio::test]
	async fn expired_token_is_refreshed_and_retried_once() {
		let transport = Arc::new(ScriptedTransport::new(accepts_t2));
		let (client, store) = build_scripted_client(transport.clone(), "T1", "R1", TIMEOUT).await;
		let response = client.send(scripted_get("/me")).await.expect("Request should recover.");
		let sent = transport.requests();
		let snapshot = store.snapshot();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(transport.refresh_calls(), 1);
		assert_eq!(sent.len(), 3);
		assert_eq!(bearer_of(&sent[0]).as_deref(), Some("Bearer T1"));
		assert!(!sent[0].is_retried());
		assert_eq!(bearer_of(&sent[2]).as_deref(), Some("Bearer T2"));
		assert!(sent[2].is_retried());
		assert_eq!(snapshot.access_token.as_ref().map(TokenSecret::expose), Some("T2"));
		assert_eq!(snapshot.refresh_token.as_ref().map(TokenSecret::expose), Some("R2"));
	}

	#[tokio::test]
	async fn other_errors_are_returned_untouched() {
		let transport = Arc::new(ScriptedTransport::new(|_| async {
			Ok(json_response(403, r#"{"error":"forbidden"}"#))
		}));
		let (client, _store) = build_scripted_client(transport.clone(), "T1", "R1", TIMEOUT).await;
		let response =
			client.send(scripted_get("/admin")).await.expect("A 403 is not a client error.");

		assert_eq!(response.status(), StatusCode::FORBIDDEN);
		assert_eq!(response.body(), br#"{"error":"forbidden"}"#);
		assert_eq!(transport.refresh_calls(), 0);
	}

	#[tokio::test]
	async fn transport_failures_never_refresh() {
		let transport = Arc::new(ScriptedTransport::new(|_| async {
			Err(TransportError::Io(std::io::Error::other("connection refused")))
		}));
		let (client, store) = build_scripted_client(transport.clone(), "T1", "R1", TIMEOUT).await;
		let err = client.send(scripted_get("/me")).await.expect_err("No response means an error.");

		assert!(matches!(err, Error::Transport(_)));
		assert!(!err.is_auth_failure());
		assert_eq!(transport.refresh_calls(), 0);
		assert!(store.snapshot().access_token.is_some());
	}

	#[tokio::test]
	async fn retried_request_is_never_refreshed_again() {
		let transport = Arc::new(ScriptedTransport::new(accepts_t2));
		let (client, _store) = build_scripted_client(transport.clone(), "T1", "R1", TIMEOUT).await;
		let err = client
			.handle_auth_expired(scripted_get("/me").mark_retried())
			.await
			.expect_err("Retried requests are exhausted.");

		assert!(matches!(err, Error::AuthExhausted { .. }));
		assert_eq!(transport.refresh_calls(), 0);
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn unauthenticated_session_fails_without_an_event() {
		let transport = Arc::new(ScriptedTransport::new(accepts_t2));
		let (client, _store) = build_scripted_client(transport.clone(), "T1", "R1", TIMEOUT).await;

		assert!(client.logout().await);

		let mut events = client.subscribe();
		let err = client.send(scripted_get("/me")).await.expect_err("No tokens, no recovery.");

		assert_eq!(err.as_refresh_failure(), Some(&RefreshError::MissingRefreshToken));
		assert_eq!(transport.refresh_calls(), 0);
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn logout_emits_one_event() {
		let transport = Arc::new(ScriptedTransport::new(accepts_t2));
		let (client, store) = build_scripted_client(transport, "T1", "R1", TIMEOUT).await;
		let mut events = client.subscribe();

		assert!(client.logout().await);
		assert!(!client.logout().await);
		assert_eq!(events.try_recv(), Ok(SessionEvent::Invalidated));
		assert!(events.try_recv().is_err());
		assert!(store.snapshot().access_token.is_none());
	}
}
