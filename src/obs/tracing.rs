//! Client flow spans.
//!
//! Every span is named `refresh_broker.flow` and carries `flow` and `stage` up front. The
//! `cycle`, `classification`, and `status` fields start empty and are filled in as the flow
//! learns them, so a retried request and the refresh cycle it joined can be correlated.

// self
use crate::{_prelude::*, obs::FlowKind};

/// Instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span handle for one client operation. Free to construct when tracing is off.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at call site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"refresh_broker.flow",
				flow = kind.as_str(),
				stage,
				cycle = tracing::field::Empty,
				classification = tracing::field::Empty,
				status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Tags the span with the refresh cycle it leads or joined.
	pub fn record_cycle(&self, cycle: u64) {
		#[cfg(feature = "tracing")]
		self.span.record("cycle", cycle);
		#[cfg(not(feature = "tracing"))]
		let _ = cycle;
	}

	/// Tags the span with the response classification (see
	/// [`Classification::as_str`](crate::classify::Classification::as_str)).
	pub fn record_classification(&self, classification: &'static str) {
		#[cfg(feature = "tracing")]
		self.span.record("classification", classification);
		#[cfg(not(feature = "tracing"))]
		let _ = classification;
	}

	/// Tags the span with the HTTP status handed back to the caller.
	pub fn record_status(&self, status: StatusCode) {
		#[cfg(feature = "tracing")]
		self.span.record("status", status.as_u16());
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
