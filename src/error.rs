//! Client-level error types shared across the decorator, coordinator, stores, and transports.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by [`AuthClient`](crate::client::AuthClient).
///
/// Non-401 HTTP statuses are not errors; they reach the caller as an
/// [`ApiResponse`](crate::http::ApiResponse) untouched.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure outside of a refresh cycle (login, decoration).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response reached the client (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// A request that was already retried with a fresh token received another 401.
	#[error("Server rejected the refreshed credentials for {method} {url}.")]
	AuthExhausted {
		/// Method of the rejected request.
		method: Method,
		/// URL of the rejected request.
		url: Url,
	},
	/// The refresh cycle this request waited on failed; the session has been invalidated.
	#[error("Access token refresh failed: {0}")]
	RefreshFailure(#[from] RefreshError),
}
impl Error {
	/// Returns `true` when the caller should route the user to re-authentication rather than
	/// offering a retry.
	pub fn is_auth_failure(&self) -> bool {
		matches!(self, Self::AuthExhausted { .. } | Self::RefreshFailure(_))
	}

	/// Returns the refresh failure, if this error came from a refresh cycle.
	pub fn as_refresh_failure(&self) -> Option<&RefreshError> {
		match self {
			Self::RefreshFailure(err) => Some(err),
			_ => None,
		}
	}
}

/// Reasons a refresh cycle failed.
///
/// Every waiter of a cycle receives its own clone of the leader's error, so all variants carry
/// owned, cloneable payloads.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// The store holds no refresh token.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the request with HTTP {status}: {message}.")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Truncated response body for diagnostics.
		message: String,
	},
	/// Refresh endpoint answered 2xx with a body that does not carry a usable token.
	#[error("Refresh endpoint returned an unusable body: {message}.")]
	MalformedResponse {
		/// Parse failure, including the offending JSON path when known.
		message: String,
	},
	/// The refresh request never produced a response.
	///
	/// A rotation the server may have applied is lost with the response, so this is terminal.
	#[error("Refresh request failed in transport: {message}.")]
	Transport {
		/// Rendered transport error.
		message: String,
	},
	/// The refresh call exceeded the configured timeout.
	#[error("Refresh request timed out after {after:?}.")]
	TimedOut {
		/// Configured bound that elapsed.
		after: StdDuration,
	},
	/// Persisting the refreshed tokens failed.
	#[error("Refreshed tokens could not be stored: {0}")]
	Storage(StoreError),
	/// The refresh leader was cancelled before the cycle settled.
	#[error("Refresh was abandoned before it completed.")]
	Abandoned,
	/// A login or logout replaced the session while the refresh was in flight; the refreshed
	/// tokens were discarded.
	#[error("Session changed while the refresh was in flight.")]
	Superseded,
}
impl RefreshError {
	/// Returns `true` when this failure must invalidate the session.
	///
	/// [`Abandoned`](Self::Abandoned) and [`Superseded`](Self::Superseded) leave the store to
	/// whoever owns it now.
	pub fn ends_session(&self) -> bool {
		!matches!(self, Self::Abandoned | Self::Superseded)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL uses a scheme other than `http` or `https`, or cannot be a base.
	#[error("Base URL `{url}` must be an absolute http(s) URL.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Refresh path could not be joined onto the base URL.
	#[error("Refresh path `{path}` is invalid.")]
	InvalidRefreshPath {
		/// Offending path.
		path: String,
	},
	/// Refresh timeout must be positive.
	#[error("Refresh timeout must be greater than zero.")]
	ZeroRefreshTimeout,
	/// Session channel must buffer at least one event.
	#[error("Session channel capacity must be greater than zero.")]
	ZeroChannelCapacity,
	/// Access token contains bytes that cannot appear in an HTTP header.
	#[error("Access token cannot be encoded as an Authorization header.")]
	InvalidAuthorizationHeader(#[from] ::http::header::InvalidHeaderValue),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Renders the error together with its source chain.
	pub fn render_chain(&self) -> String {
		let mut rendered = self.to_string();
		let mut source = StdError::source(self);

		while let Some(cause) = source {
			rendered.push_str(": ");
			rendered.push_str(&cause.to_string());

			source = cause.source();
		}

		rendered
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		Self::Transport { message: e.render_chain() }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn auth_failures_are_distinct_from_network_errors() {
		let exhausted = Error::AuthExhausted {
			method: Method::GET,
			url: Url::parse("https://api.example.test/me").expect("Fixture URL should parse."),
		};
		let refresh = Error::from(RefreshError::MissingRefreshToken);
		let network = Error::from(TransportError::Io(std::io::Error::other("reset")));

		assert!(exhausted.is_auth_failure());
		assert!(refresh.is_auth_failure());
		assert!(!network.is_auth_failure());
		assert_eq!(refresh.as_refresh_failure(), Some(&RefreshError::MissingRefreshToken));
	}

	#[test]
	fn transport_errors_render_their_source_chain() {
		let err = TransportError::network(std::io::Error::other("connection refused"));
		let refresh = RefreshError::from(err);

		match refresh {
			RefreshError::Transport { message } => {
				assert!(message.contains("Network error"));
				assert!(message.contains("connection refused"));
			},
			other => panic!("Unexpected refresh error variant: {other:?}."),
		}
	}

	#[test]
	fn only_refresh_failures_end_the_session() {
		assert!(RefreshError::MissingRefreshToken.ends_session());
		assert!(RefreshError::TimedOut { after: StdDuration::from_secs(1) }.ends_session());
		assert!(!RefreshError::Abandoned.ends_session());
		assert!(!RefreshError::Superseded.ends_session());
	}

	#[test]
	fn store_error_keeps_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let err: Error = store_error.clone().into();

		assert!(err.to_string().contains("disk full"));

		let source =
			StdError::source(&err).expect("Storage errors should expose the store error.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
