//! Single-flight gate for access-token reissue.
//!
//! The first request to hit a 401 while no reissue is running becomes the leader and receives a
//! [`RefreshLease`]; every request that arrives while the lease is alive is parked as a
//! [`RefreshWaiter`]. Settling the lease clears the in-flight flag and drains the waiters in
//! arrival order under one lock acquisition, so no waiter is resolved twice or left behind. A
//! lease dropped without being settled (its leader was cancelled) rejects its waiters with
//! [`RefreshError::Abandoned`] and counts as a failed cycle; the client sends such waiters back
//! through the gate instead of surfacing the error.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::{collections::VecDeque, mem};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::BearerToken};

/// Result every participant of one reissue cycle observes.
pub type RefreshOutcome = Result<BearerToken, RefreshError>;

/// Why a reissue failed. Cloned to every waiter of the failed cycle.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// The reissue endpoint answered 401: the refresh credential itself is no longer valid.
	#[error("Reissue endpoint rejected the refresh credential with status {status}.")]
	Rejected {
		/// Status returned by the reissue endpoint.
		status: u16,
	},
	/// The reissue endpoint answered with another non-success status.
	#[error("Reissue endpoint answered with status {status}.")]
	Status {
		/// Status returned by the reissue endpoint.
		status: u16,
	},
	/// The reissue response succeeded but carried no bearer token.
	#[error("Reissue response carried no bearer token.")]
	MissingToken,
	/// The reissue call produced no response.
	#[error("Reissue call produced no response: {message}")]
	Transport {
		/// Rendered transport failure.
		message: String,
	},
	/// The leader went away before settling the cycle; the session itself was left untouched.
	#[error("Reissue was abandoned before it settled.")]
	Abandoned,
}
impl RefreshError {
	/// Whether the resulting logout should notify the backend.
	///
	/// A rejected refresh credential means the server already considers the session over.
	pub fn notifies_server(&self) -> bool {
		!matches!(self, Self::Rejected { .. })
	}
}

#[derive(Debug, Default)]
struct GateState {
	in_flight: bool,
	waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// Process-wide reissue coordination state.
#[derive(Debug, Default)]
pub struct RefreshGate {
	state: Mutex<GateState>,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshGate {
	/// Creates a gate that records abandoned cycles into `metrics`.
	pub fn with_metrics(metrics: Arc<RefreshMetrics>) -> Self {
		Self { state: Default::default(), metrics }
	}

	/// Becomes the leader when no reissue is running, otherwise joins the queue.
	///
	/// The flag flip and the enqueue happen under the same lock acquisition, before the caller
	/// reaches any suspension point.
	pub fn acquire_or_enqueue(&self) -> Admission<'_> {
		let mut state = self.state.lock();

		if state.in_flight {
			let (tx, rx) = oneshot::channel();

			state.waiters.push_back(tx);

			Admission::Waiter(RefreshWaiter(rx))
		} else {
			state.in_flight = true;

			Admission::Leader(RefreshLease { gate: self, settled: false })
		}
	}

	/// Returns `true` while a leader holds the lease.
	pub fn is_in_flight(&self) -> bool {
		self.state.lock().in_flight
	}

	/// Number of requests parked behind the current leader.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	fn settle(&self, outcome: RefreshOutcome) -> usize {
		let waiters = {
			let mut state = self.state.lock();

			state.in_flight = false;

			mem::take(&mut state.waiters)
		};
		let count = waiters.len();

		for waiter in waiters {
			// A waiter whose caller was dropped simply misses the outcome.
			let _ = waiter.send(outcome.clone());
		}

		count
	}
}

/// Result of [`RefreshGate::acquire_or_enqueue`].
#[derive(Debug)]
pub enum Admission<'a> {
	/// The caller must perform the reissue and settle the lease.
	Leader(RefreshLease<'a>),
	/// The caller must wait for the leader's outcome.
	Waiter(RefreshWaiter),
}

/// Exclusive right to run the reissue call; settles the gate exactly once.
#[derive(Debug)]
pub struct RefreshLease<'a> {
	gate: &'a RefreshGate,
	settled: bool,
}
impl RefreshLease<'_> {
	/// Publishes `outcome` to every waiter (FIFO) and reopens the gate.
	///
	/// Returns how many waiters were released.
	pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
		self.settled = true;

		self.gate.settle(outcome)
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.gate.metrics.record_failure();
			self.gate.settle(Err(RefreshError::Abandoned));
		}
	}
}

/// Parked request waiting for the current leader's outcome.
#[derive(Debug)]
pub struct RefreshWaiter(oneshot::Receiver<RefreshOutcome>);
impl RefreshWaiter {
	/// Resolves once the leader settles.
	pub async fn wait(self) -> RefreshOutcome {
		self.0.await.unwrap_or(Err(RefreshError::Abandoned))
	}
}
