//! Request decoration: attaching the current access token to outgoing requests.
//!
//! [`RequestSigner`] is the seam; [`BearerSigner`] writes `Authorization: Bearer <token>`.
//! Signing is pure: it reads a token the caller already fetched and never blocks on the
//! refresh coordinator.

// self
use crate::{
	_prelude::*, auth::TokenSecret, error::ConfigError, http::ApiRequest, store::TokenStore,
};

/// Describes how to attach an access token to an outbound request.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Returns `request` carrying `token`, or unchanged when `token` is `None`.
	fn sign(
		&self,
		request: ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiRequest, ConfigError>;
}

/// Default signer emitting RFC 6750 bearer headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl BearerSigner {
	/// Builds the sensitive `Bearer <token>` header value.
	pub fn header_value(token: &TokenSecret) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose()))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl RequestSigner for BearerSigner {
	fn sign(
		&self,
		mut request: ApiRequest,
		token: Option<&TokenSecret>,
	) -> Result<ApiRequest, ConfigError> {
		if let Some(token) = token {
			request.headers_mut().insert(header::AUTHORIZATION, Self::header_value(token)?);
		}

		Ok(request)
	}
}

/// Reads the current access token from `store` and signs `request` with it.
pub async fn decorate(
	store: &dyn TokenStore,
	signer: &dyn RequestSigner,
	request: ApiRequest,
) -> Result<ApiRequest> {
	let token = store.access_token().await?;

	Ok(signer.sign(request, token.as_ref())?)
}
