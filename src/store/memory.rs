//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{StoreFuture, StoredTokens, TokenStore},
};

type StoreCell = Arc<RwLock<StoredTokens>>;

/// Storage backend that keeps the token pair in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreCell);
impl MemoryStore {
	/// Returns a copy of the current contents.
	pub fn snapshot(&self) -> StoredTokens {
		self.0.read().clone()
	}

	fn set_now(cell: StoreCell, access: TokenSecret, refresh: Option<TokenSecret>) {
		cell.write().apply(access, refresh);
	}

	fn clear_now(cell: StoreCell) {
		let mut guard = cell.write();

		if !guard.is_empty() {
			guard.wipe();
		}
	}
}
impl TokenStore for MemoryStore {
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().access_token.clone()) })
	}

	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let cell = self.0.clone();

		Box::pin(async move { Ok(cell.read().refresh_token.clone()) })
	}

	fn set_tokens(
		&self,
		access: TokenSecret,
		refresh: Option<TokenSecret>,
	) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::set_now(cell, access, refresh);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::clear_now(cell);

			Ok(())
		})
	}
}
