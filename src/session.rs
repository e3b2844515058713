//! Session ownership of the token store: login, refresh commits, and invalidation.
//!
//! Every write to the store goes through one async gate that also carries a session epoch.
//! Login and invalidation bump the epoch; a refresh leader captures it before reading the
//! refresh token and may only commit its result while the epoch is unchanged. An explicit
//! logout that lands mid-refresh therefore stays logged out.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	error::RefreshError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_debug, trace_warn},
	store::{StoreError, TokenStore},
};

/// Signal raised when the session's tokens are gone and the user must authenticate again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// Tokens were cleared after an unrecoverable refresh failure or an explicit logout.
	Invalidated,
}

/// Clears the [`TokenStore`] and broadcasts [`SessionEvent::Invalidated`].
///
/// Invalidations, logins, and refresh commits are serialized so two concurrent callers cannot
/// both observe a populated store and emit twice, and a stale refresh cannot resurrect a
/// session.
pub struct SessionInvalidator {
	store: Arc<dyn TokenStore>,
	events: broadcast::Sender<SessionEvent>,
	gate: AsyncMutex<()>,
	epoch: AtomicU64,
}
impl SessionInvalidator {
	/// Creates an invalidator over `store` whose subscribers buffer up to `capacity` events.
	///
	/// `capacity` must be non-zero; [`ClientConfig`](crate::config::ClientConfig) validates it.
	pub fn new(store: Arc<dyn TokenStore>, capacity: usize) -> Self {
		let (events, _) = broadcast::channel(capacity.max(1));

		Self { store, events, gate: AsyncMutex::new(()), epoch: AtomicU64::new(0) }
	}

	/// Returns a receiver for future session events.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.events.subscribe()
	}

	/// Store guarded by this session.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Current session epoch. Changes on every login and invalidation.
	pub fn epoch(&self) -> u64 {
		self.epoch.load(Ordering::Acquire)
	}

	/// Starts a new session with `pair`, superseding any refresh in flight.
	pub async fn establish(&self, pair: TokenPair) -> Result<(), StoreError> {
		let _gate = self.gate.lock().await;

		self.epoch.fetch_add(1, Ordering::AcqRel);

		<dyn TokenStore>::save_pair(self.store.as_ref(), pair).await
	}

	/// Persists a refreshed pair if the session is still the one observed at `epoch`.
	pub async fn commit_refresh(&self, epoch: u64, pair: TokenPair) -> Result<(), RefreshError> {
		let _gate = self.gate.lock().await;

		if self.epoch() != epoch {
			trace_debug!(
				epoch,
				current = self.epoch(),
				"Discarding refresh for a replaced session."
			);

			return Err(RefreshError::Superseded);
		}

		<dyn TokenStore>::save_pair(self.store.as_ref(), pair).await.map_err(RefreshError::Storage)
	}

	/// Clears the store and emits one event.
	///
	/// Does nothing when both tokens are already absent. Never fails: store errors are logged
	/// and the event is still emitted. Returns `true` when an event was emitted.
	pub async fn invalidate(&self) -> bool {
		const KIND: FlowKind = FlowKind::Invalidate;

		let span = FlowSpan::new(KIND, "invalidate");

		span.instrument(async move {
			let _gate = self.gate.lock().await;

			self.epoch.fetch_add(1, Ordering::AcqRel);

			match self.store.is_cleared().await {
				Ok(true) => {
					trace_debug!("Session already invalidated.");

					return false;
				},
				Ok(false) => {},
				Err(e) => {
					trace_warn!(error = %e, "Failed to inspect token store before invalidation.");

					#[cfg(not(feature = "tracing"))]
					let _ = e;
				},
			}

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let cleared = self.store.clear().await;

			if let Err(e) = &cleared {
				trace_warn!(error = %e, "Failed to clear token store; emitting logout anyway.");

				#[cfg(not(feature = "tracing"))]
				let _ = e;
			}

			obs::record_flow_result(KIND, &cleared);

			// No receivers is fine; the next subscriber only sees later events.
			let _ = self.events.send(SessionEvent::Invalidated);

			trace_debug!("Session invalidated.");

			true
		})
		.await
	}
}
impl Debug for SessionInvalidator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionInvalidator")
			.field("subscribers", &self.events.receiver_count())
			.finish()
	}
}
