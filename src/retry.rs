//! Resubmission of a request after a successful refresh.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	classify::{self, Classification},
	http::{ApiRequest, ApiResponse, Transport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	sign::RequestSigner,
};

/// Re-signs a request with a fresh token and sends it exactly once more.
///
/// The executor never re-enters the refresh coordinator: a 401 on the retried request
/// classifies as [`Classification::AuthExhausted`] and surfaces as
/// [`Error::AuthExhausted`].
pub struct RetryExecutor<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	signer: Arc<dyn RequestSigner>,
}
impl<T> RetryExecutor<T>
where
	T: ?Sized + Transport,
{
	/// Creates an executor that signs with `signer` and sends through `transport`.
	pub fn new(transport: Arc<T>, signer: Arc<dyn RequestSigner>) -> Self {
		Self { transport, signer }
	}

	/// Returns a copy of `request` carrying `token` and the retried marker.
	pub fn prepare(&self, request: ApiRequest, token: &TokenSecret) -> Result<ApiRequest> {
		Ok(self.signer.sign(request, Some(token))?.mark_retried())
	}

	/// Sends the prepared retry and surfaces its classification.
	pub async fn execute(&self, request: ApiRequest, token: &TokenSecret) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Retry;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = self.prepare(request, token)?;
				let outcome = self.transport.send(request.clone()).await;

				surface(&request, classify::classify(&request, outcome))
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}
}
impl<T> Debug for RetryExecutor<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RetryExecutor").finish_non_exhaustive()
	}
}

/// Maps every classification except [`Classification::AuthExpired`] to the caller-facing
/// result. An `AuthExpired` reaching this point is treated as exhausted.
pub(crate) fn surface(request: &ApiRequest, class: Classification) -> Result<ApiResponse> {
	match class {
		Classification::Success(response) | Classification::OtherHttpError(response) => {
			Ok(response)
		},
		Classification::TransportError(e) => Err(e.into()),
		Classification::AuthExpired(_) | Classification::AuthExhausted(_) => {
			Err(Error::AuthExhausted {
				method: request.method().clone(),
				url: request.url().clone(),
			})
		},
	}
}
