//! Client configuration: refresh endpoint location, refresh timeout, and session channel sizing.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Path of the refresh endpoint relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
/// Upper bound on a single refresh round trip.
pub const DEFAULT_REFRESH_TIMEOUT: StdDuration = StdDuration::from_secs(10);
/// Buffered session events per subscriber.
pub const DEFAULT_SESSION_CHANNEL_CAPACITY: usize = 16;

/// Validated client configuration.
///
/// Construct via [`ClientConfig::builder`] or deserialize a [`ClientConfigBuilder`] and call
/// [`ClientConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
	base_url: Url,
	refresh_url: Url,
	refresh_timeout: StdDuration,
	session_channel_capacity: usize,
}
impl ClientConfig {
	/// Starts a builder for the API rooted at `base_url`.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// API base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> &Url {
		&self.refresh_url
	}

	/// Bound applied to each refresh call.
	pub fn refresh_timeout(&self) -> StdDuration {
		self.refresh_timeout
	}

	/// Capacity of the session event channel.
	pub fn session_channel_capacity(&self) -> usize {
		self.session_channel_capacity
	}
}

/// Builder (and serde-facing shape) for [`ClientConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigBuilder {
	/// API base URL; the refresh path is joined onto it.
	pub base_url: Url,
	/// Refresh endpoint path, absolute from the host root.
	///
	/// Any path on [`base_url`](Self::base_url) is replaced, not extended:
	/// `https://api.example.test/v1/` with `/auth/refresh` resolves to
	/// `https://api.example.test/auth/refresh`. Include the prefix (`/v1/auth/refresh`) when
	/// the endpoint lives under it.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Refresh timeout in milliseconds.
	#[serde(default = "default_refresh_timeout_ms")]
	pub refresh_timeout_ms: u64,
	/// Session event channel capacity.
	#[serde(default = "default_session_channel_capacity")]
	pub session_channel_capacity: usize,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_path: default_refresh_path(),
			refresh_timeout_ms: default_refresh_timeout_ms(),
			session_channel_capacity: default_session_channel_capacity(),
		}
	}

	/// Overrides the refresh endpoint path.
	///
	/// The path must start with `/` and resolves from the host root, dropping any base path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the refresh timeout.
	pub fn refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.refresh_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

		self
	}

	/// Overrides the session channel capacity.
	pub fn session_channel_capacity(mut self, capacity: usize) -> Self {
		self.session_channel_capacity = capacity;

		self
	}

	/// Validates the builder and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base()
		{
			return Err(ConfigError::InvalidBaseUrl { url: self.base_url.to_string() });
		}
		if !self.refresh_path.starts_with('/') {
			return Err(ConfigError::InvalidRefreshPath { path: self.refresh_path });
		}
		if self.refresh_timeout_ms == 0 {
			return Err(ConfigError::ZeroRefreshTimeout);
		}
		if self.session_channel_capacity == 0 {
			return Err(ConfigError::ZeroChannelCapacity);
		}

		let refresh_url = self
			.base_url
			.join(&self.refresh_path)
			.map_err(|_| ConfigError::InvalidRefreshPath { path: self.refresh_path.clone() })?;

		Ok(ClientConfig {
			base_url: self.base_url,
			refresh_url,
			refresh_timeout: StdDuration::from_millis(self.refresh_timeout_ms),
			session_channel_capacity: self.session_channel_capacity,
		})
	}
}

fn default_refresh_path() -> String {
	DEFAULT_REFRESH_PATH.into()
}

fn default_refresh_timeout_ms() -> u64 {
	u64::try_from(DEFAULT_REFRESH_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

fn default_session_channel_capacity() -> usize {
	DEFAULT_SESSION_CHANNEL_CAPACITY
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://api.example.test/v1/").expect("Fixture base URL should parse.")
	}

	#[test]
	fn defaults_resolve_refresh_url_against_host_root() {
		let config = ClientConfig::builder(base()).build().expect("Defaults should validate.");

		assert_eq!(config.refresh_url().as_str(), "https://api.example.test/auth/refresh");
		assert_eq!(config.refresh_timeout(), DEFAULT_REFRESH_TIMEOUT);
		assert_eq!(config.session_channel_capacity(), DEFAULT_SESSION_CHANNEL_CAPACITY);
	}

	#[test]
	fn refresh_path_keeps_an_explicit_base_prefix() {
		let config = ClientConfig::builder(base())
			.refresh_path("/v1/auth/refresh")
			.build()
			.expect("Prefixed refresh path should validate.");

		assert_eq!(config.refresh_url().as_str(), "https://api.example.test/v1/auth/refresh");
	}

	#[test]
	fn rejects_invalid_settings() {
		let err = ClientConfig::builder(base())
			.refresh_timeout(StdDuration::ZERO)
			.build()
			.expect_err("Zero timeout must be rejected.");

		assert!(matches!(err, ConfigError::ZeroRefreshTimeout));

		let err = ClientConfig::builder(base())
			.refresh_path("auth/refresh")
			.build()
			.expect_err("Relative refresh paths must be rejected.");

		assert!(matches!(err, ConfigError::InvalidRefreshPath { .. }));

		let err = ClientConfig::builder(
			Url::parse("ftp://files.example.test").expect("Fixture URL should parse."),
		)
		.build()
		.expect_err("Non-HTTP schemes must be rejected.");

		assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

		let err = ClientConfig::builder(base())
			.session_channel_capacity(0)
			.build()
			.expect_err("Zero capacity must be rejected.");

		assert!(matches!(err, ConfigError::ZeroChannelCapacity));
	}

	#[test]
	fn deserializes_with_defaults() {
		let builder: ClientConfigBuilder = serde_json::from_str(
			r#"{"baseUrl":"http://localhost:8080","refreshTimeoutMs":250}"#,
		)
		.expect("Config JSON should deserialize.");
		let config = builder.build().expect("Deserialized config should validate.");

		assert_eq!(config.refresh_url().as_str(), "http://localhost:8080/auth/refresh");
		assert_eq!(config.refresh_timeout(), StdDuration::from_millis(250));
	}
}
