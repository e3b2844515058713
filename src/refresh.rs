//! Single-flight refresh coordination with waiter fan-out, bounded refresh calls, and
//! cancellation-safe waiters.
//!
//! [`RefreshCoordinator::obtain_token`] is entered by every request that observed an expired
//! access token. Under one mutex the coordinator either starts a new refresh cycle (the caller
//! becomes the leader) or appends the caller to the current cycle's FIFO waiter queue. The
//! leader runs the refresh, bounded by the configured timeout; when it settles, the state
//! returns to [`RefreshState::Idle`] and every waiter of that cycle receives a clone of the
//! leader's outcome through its own one-shot channel. A failed cycle invalidates the session
//! before any waiter is released.
//!
//! Dropping a waiter's future removes it from the queue. Dropping the leader's future settles
//! the cycle with [`RefreshError::Abandoned`], so waiters never outlive their leader.

mod endpoint;
mod metrics;

pub use endpoint::RefreshEndpoint;
pub use metrics::RefreshMetrics;

// std
use std::{collections::VecDeque, mem, time::Duration as StdDuration};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::RefreshError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, trace_debug, trace_warn},
	session::SessionInvalidator,
};

/// Outcome shared by every participant of one refresh cycle.
pub type RefreshOutcome = Result<TokenSecret, RefreshError>;

/// Coordinator state. Waiters exist only while a cycle is in flight.
#[derive(Debug, Default)]
pub enum RefreshState {
	/// No refresh in flight.
	#[default]
	Idle,
	/// A leader is refreshing; `waiters` joined after it started.
	Refreshing {
		/// Monotonic cycle number.
		cycle: u64,
		/// Pending waiters in arrival order.
		waiters: VecDeque<Waiter>,
	},
}

/// Queued participant of a refresh cycle.
pub struct Waiter {
	id: u64,
	tx: oneshot::Sender<RefreshOutcome>,
}
impl Debug for Waiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Waiter").field("id", &self.id).finish()
	}
}

#[derive(Debug, Default)]
struct Inner {
	state: RefreshState,
	last_cycle: u64,
	last_waiter: u64,
}

type SharedState = Arc<Mutex<Inner>>;

enum Role {
	Leader(LeaderGuard),
	Waiter(WaiterTicket),
}

/// Ensures at most one refresh is in flight and fans its result out to concurrent callers.
pub struct RefreshCoordinator {
	shared: SharedState,
	invalidator: Arc<SessionInvalidator>,
	metrics: Arc<RefreshMetrics>,
	timeout: StdDuration,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator that bounds each refresh by `timeout`.
	pub fn new(invalidator: Arc<SessionInvalidator>, timeout: StdDuration) -> Self {
		Self { shared: Default::default(), invalidator, metrics: Default::default(), timeout }
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Returns `true` while a cycle is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(self.shared.lock().state, RefreshState::Refreshing { .. })
	}

	/// Number of callers currently waiting on the in-flight cycle.
	pub fn waiter_count(&self) -> usize {
		match &self.shared.lock().state {
			RefreshState::Refreshing { waiters, .. } => waiters.len(),
			RefreshState::Idle => 0,
		}
	}

	/// Returns a fresh access token, running `refresh` only if no cycle is in flight.
	///
	/// `refresh` must persist the new tokens before resolving. It is called at most once per
	/// cycle, by the leader; waiters drop it unused.
	pub async fn obtain_token<F, Fut>(&self, refresh: F) -> RefreshOutcome
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RefreshOutcome>,
	{
		match self.enter() {
			Role::Leader(guard) => self.lead(guard, refresh).await,
			Role::Waiter(ticket) => {
				self.metrics.record_coalesced();

				trace_debug!(
					cycle = ticket.cycle,
					waiter = ticket.id,
					"Joined in-flight refresh."
				);

				ticket.wait().await
			},
		}
	}

	fn enter(&self) -> Role {
		let mut inner = self.shared.lock();
		let Inner { state, last_cycle, last_waiter } = &mut *inner;

		match state {
			RefreshState::Refreshing { cycle, waiters } => {
				let (tx, rx) = oneshot::channel();

				*last_waiter += 1;

				waiters.push_back(Waiter { id: *last_waiter, tx });

				Role::Waiter(WaiterTicket {
					shared: self.shared.clone(),
					cycle: *cycle,
					id: *last_waiter,
					rx,
					received: false,
				})
			},
			RefreshState::Idle => {
				*last_cycle += 1;
				*state =
					RefreshState::Refreshing { cycle: *last_cycle, waiters: VecDeque::new() };

				Role::Leader(LeaderGuard {
					shared: self.shared.clone(),
					cycle: *last_cycle,
					settled: false,
				})
			},
		}
	}

	async fn lead<F, Fut>(&self, mut guard: LeaderGuard, refresh: F) -> RefreshOutcome
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RefreshOutcome>,
	{
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "obtain_token");

		span.record_cycle(guard.cycle);
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		span.instrument(async move {
			let cycle = guard.cycle;

			trace_debug!(cycle, "Leading refresh cycle.");

			let outcome = match tokio::time::timeout(self.timeout, refresh()).await {
				Ok(outcome) => outcome,
				Err(_) => {
					self.metrics.record_timeout();

					Err(RefreshError::TimedOut { after: self.timeout })
				},
			};

			obs::record_flow_result(KIND, &outcome);

			match &outcome {
				Ok(_) => self.metrics.record_success(),
				Err(e) => {
					self.metrics.record_failure();

					if e.ends_session() {
						trace_warn!(
							cycle,
							error = %e,
							"Refresh cycle failed; invalidating session."
						);

						self.invalidator.invalidate().await;
					} else {
						trace_debug!(cycle, error = %e, "Refresh cycle ended without a new token.");
					}
				},
			}

			let released = guard.settle(outcome.clone()).len();

			trace_debug!(cycle, released, "Refresh cycle settled.");

			#[cfg(not(feature = "tracing"))]
			let _ = (cycle, released);

			outcome
		})
		.await
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("state", &self.shared.lock().state)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Leader's handle on its cycle; settles the cycle on drop if the leader never did.
struct LeaderGuard {
	shared: SharedState,
	cycle: u64,
	settled: bool,
}
impl LeaderGuard {
	fn settle(&mut self, outcome: RefreshOutcome) -> Vec<u64> {
		self.settled = true;

		settle_cycle(&self.shared, self.cycle, outcome)
	}
}
impl Drop for LeaderGuard {
	fn drop(&mut self) {
		if !self.settled {
			trace_warn!(cycle = self.cycle, "Refresh leader dropped before settling.");

			settle_cycle(&self.shared, self.cycle, Err(RefreshError::Abandoned));
		}
	}
}

/// Waiter's handle on its queue slot; leaves the queue on drop if still pending.
struct WaiterTicket {
	shared: SharedState,
	cycle: u64,
	id: u64,
	rx: oneshot::Receiver<RefreshOutcome>,
	received: bool,
}
impl WaiterTicket {
	async fn wait(mut self) -> RefreshOutcome {
		let outcome = (&mut self.rx).await;

		self.received = true;

		outcome.unwrap_or(Err(RefreshError::Abandoned))
	}
}
impl Drop for WaiterTicket {
	fn drop(&mut self) {
		if self.received {
			return;
		}

		let mut inner = self.shared.lock();

		if let RefreshState::Refreshing { cycle, waiters } = &mut inner.state {
			if *cycle == self.cycle {
				waiters.retain(|waiter| waiter.id != self.id);
			}
		}
	}
}

/// Returns `cycle` to idle and releases its waiters in FIFO order. No-op for stale cycles.
///
/// Returns the released waiter ids in delivery order.
fn settle_cycle(shared: &SharedState, cycle: u64, outcome: RefreshOutcome) -> Vec<u64> {
	let waiters = {
		let mut inner = shared.lock();
		let current = match &inner.state {
			RefreshState::Refreshing { cycle: current, .. } => Some(*current),
			RefreshState::Idle => None,
		};

		if current != Some(cycle) {
			return Vec::new();
		}

		match mem::take(&mut inner.state) {
			RefreshState::Refreshing { waiters, .. } => waiters,
			RefreshState::Idle => VecDeque::new(),
		}
	};
	let mut released = Vec::with_capacity(waiters.len());

	for waiter in waiters {
		released.push(waiter.id);

		// A waiter whose receiver is gone was cancelled between settling and delivery.
		let _ = waiter.tx.send(outcome.clone());
	}

	released
}
