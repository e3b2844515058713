//! Storage contract and built-in stores for the current access/refresh token pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable holder of the session's current tokens.
///
/// The store is the single owner of token material: the client reads it per request and
/// never caches a token beyond one exchange. Only the refresh leader, login, and the session
/// invalidator write to it.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current access token, if any.
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Returns the current refresh token, if any.
	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Replaces the access token and, when `refresh` is `Some`, the refresh token.
	///
	/// A `None` refresh keeps the previously stored refresh token so non-rotating servers keep
	/// working.
	fn set_tokens(
		&self,
		access: TokenSecret,
		refresh: Option<TokenSecret>,
	) -> StoreFuture<'_, ()>;

	/// Removes both tokens. Clearing an empty store succeeds.
	fn clear(&self) -> StoreFuture<'_, ()>;
}
impl dyn TokenStore + '_ {
	/// Writes a freshly issued pair.
	pub async fn save_pair(&self, pair: TokenPair) -> Result<(), StoreError> {
		self.set_tokens(pair.access_token, pair.refresh_token).await
	}

	/// Returns `true` when neither token is present.
	pub async fn is_cleared(&self) -> Result<bool, StoreError> {
		Ok(self.access_token().await?.is_none() && self.refresh_token().await?.is_none())
	}
}

/// Snapshot of the stored tokens; the persisted shape of [`FileStore`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
	/// Current access token.
	pub access_token: Option<TokenSecret>,
	/// Current refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Instant of the last mutation.
	pub updated_at: Option<OffsetDateTime>,
}
impl StoredTokens {
	fn apply(&mut self, access: TokenSecret, refresh: Option<TokenSecret>) {
		self.access_token = Some(access);

		if let Some(refresh) = refresh {
			self.refresh_token = Some(refresh);
		}

		self.updated_at = Some(OffsetDateTime::now_utc());
	}

	fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	fn wipe(&mut self) {
		*self = Self { updated_at: Some(OffsetDateTime::now_utc()), ..Self::default() };
	}
}
impl Debug for StoredTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StoredTokens")
			.field("access_token_set", &self.access_token.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
