//! Client for the refresh endpoint: `POST {"refreshToken"}` → `{"accessToken", "refreshToken"?}`.

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	error::RefreshError,
	http::{ApiRequest, Transport},
	session::SessionInvalidator,
	store::TokenStore,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Performs refresh calls over a [`Transport`] and persists the result.
pub struct RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	url: Url,
	transport: Arc<T>,
}
impl<T> RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client for the endpoint at `url`.
	pub fn new(url: Url, transport: Arc<T>) -> Self {
		Self { url, transport }
	}

	/// Endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Exchanges `refresh_token` for a new pair without touching any store.
	///
	/// Non-2xx statuses, malformed bodies, and blank access tokens are all failures. A blank or
	/// missing `refreshToken` means the server did not rotate it.
	pub async fn exchange(&self, refresh_token: &TokenSecret) -> Result<TokenPair, RefreshError> {
		let body = serde_json::json!({ "refreshToken": refresh_token.expose() }).to_string();
		let request = ApiRequest::new(Method::POST, self.url.clone())
			.with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_header(header::ACCEPT, HeaderValue::from_static("application/json"))
			.with_body(body);
		let response = self.transport.send(request).await?;

		if !response.status().is_success() {
			return Err(RefreshError::Rejected {
				status: response.status().as_u16(),
				message: response.body_preview(),
			});
		}

		let payload = response.json::<RefreshResponseBody>().map_err(|e| {
			RefreshError::MalformedResponse { message: format!("{} at `{}`", e.inner(), e.path()) }
		})?;
		let access_token = TokenSecret::new(payload.access_token);

		if access_token.is_blank() {
			return Err(RefreshError::MalformedResponse {
				message: "accessToken is empty".into(),
			});
		}

		let refresh_token =
			payload.refresh_token.map(TokenSecret::new).filter(|secret| !secret.is_blank());

		Ok(TokenPair::new(access_token, refresh_token))
	}

	/// Reads the refresh token from the session's store, exchanges it, and commits the new pair.
	///
	/// Returns the new access token once it is durable. Fails with
	/// [`RefreshError::Superseded`] when a login or logout replaced the session meanwhile.
	pub async fn refresh_and_store(
		&self,
		session: &SessionInvalidator,
	) -> Result<TokenSecret, RefreshError> {
		let epoch = session.epoch();
		let refresh_token = session
			.store()
			.refresh_token()
			.await
			.map_err(RefreshError::Storage)?
			.filter(|secret| !secret.is_blank())
			.ok_or(RefreshError::MissingRefreshToken)?;
		let pair = self.exchange(&refresh_token).await?;
		let access_token = pair.access_token.clone();

		session.commit_refresh(epoch, pair).await?;

		Ok(access_token)
	}
}
impl<T> Debug for RefreshEndpoint<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshEndpoint").field("url", &self.url.as_str()).finish()
	}
}
