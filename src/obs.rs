//! Optional observability helpers for client operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `refresh_broker.flow` with the `flow` and
//!   `stage` (call site) fields, plus events for leader/waiter decisions and session
//!   invalidation.
//! - Enable `metrics` to increment the `refresh_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Client operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Decorated request sent through the transport.
	Request,
	/// Refresh cycle led by this caller.
	Refresh,
	/// Resubmission after a refresh.
	Retry,
	/// Session invalidation.
	Invalidate,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Refresh => "refresh",
			FlowKind::Retry => "retry",
			FlowKind::Invalidate => "invalidate",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a client helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a debug-level event when the `tracing` feature is enabled.
macro_rules! trace_debug {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::debug!($($arg)*);
		}
	};
}

/// Emits a warn-level event when the `tracing` feature is enabled.
macro_rules! trace_warn {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::warn!($($arg)*);
		}
	};
}

pub(crate) use {trace_debug, trace_warn};
