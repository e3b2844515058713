//! Access/refresh token pair written to the store at login and after each refresh.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials minted together by the authentication server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Short-lived bearer credential attached to every request.
	pub access_token: TokenSecret,
	/// Longer-lived credential consumed by the refresh endpoint.
	///
	/// `None` means the issuer did not rotate it; stores keep the previous value.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the pair was received.
	pub issued_at: OffsetDateTime,
}
impl TokenPair {
	/// Creates a pair stamped with the current UTC instant.
	pub fn new(access_token: TokenSecret, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token, refresh_token, issued_at: OffsetDateTime::now_utc() }
	}

	/// Returns `true` when the issuer handed out a new refresh token.
	pub fn rotates_refresh(&self) -> bool {
		self.refresh_token.is_some()
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &self.access_token)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_output_never_leaks_secrets() {
		let pair =
			TokenPair::new(TokenSecret::new("access-123"), Some(TokenSecret::new("refresh-456")));
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("access-123"));
		assert!(!rendered.contains("refresh-456"));
		assert!(rendered.contains("refresh_token_set: true"));
		assert!(pair.rotates_refresh());
	}
}
