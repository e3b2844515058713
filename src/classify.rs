//! Response classification: decides which exchanges enter the refresh coordinator.

// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::{ApiRequest, ApiResponse},
};

/// Outcome of one exchange, as seen by the client.
#[derive(Debug)]
pub enum Classification {
	/// Any non-error status.
	Success(ApiResponse),
	/// First 401 for a request; recoverable through a refresh.
	AuthExpired(ApiResponse),
	/// 401 for a request that was already retried; terminal.
	AuthExhausted(ApiResponse),
	/// Any other 4xx/5xx status; handed back to the caller untouched.
	OtherHttpError(ApiResponse),
	/// No response reached the client.
	TransportError(TransportError),
}
impl Classification {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Success(_) => "success",
			Self::AuthExpired(_) => "auth_expired",
			Self::AuthExhausted(_) => "auth_exhausted",
			Self::OtherHttpError(_) => "other_http_error",
			Self::TransportError(_) => "transport_error",
		}
	}

	/// Returns `true` only for the classification that drives a refresh.
	pub fn needs_refresh(&self) -> bool {
		matches!(self, Self::AuthExpired(_))
	}
}

/// Classifies the result of sending `request`.
pub fn classify(
	request: &ApiRequest,
	outcome: Result<ApiResponse, TransportError>,
) -> Classification {
	let response = match outcome {
		Ok(response) => response,
		Err(err) => return Classification::TransportError(err),
	};
	let status = response.status();

	if status == StatusCode::UNAUTHORIZED {
		if request.is_retried() {
			Classification::AuthExhausted(response)
		} else {
			Classification::AuthExpired(response)
		}
	} else if status.is_client_error() || status.is_server_error() {
		Classification::OtherHttpError(response)
	} else {
		Classification::Success(response)
	}
}
