//! Failed-response classification.

// self
use crate::{
	_prelude::*,
	config::ClientDescriptor,
	refresh::{Admission, RefreshGate, RefreshLease, RefreshWaiter},
	request::ApiRequest,
};

/// Why a failed response is handed back to the caller untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassThroughReason {
	/// The status is not 401.
	NotUnauthorized,
	/// The request already used its single reissue-and-replay cycle.
	AlreadyRetried,
	/// The route manages its own credentials and is excluded from recovery.
	Excluded,
}
impl PassThroughReason {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NotUnauthorized => "not_unauthorized",
			Self::AlreadyRetried => "already_retried",
			Self::Excluded => "excluded",
		}
	}
}

/// What the client does with a failed response.
#[derive(Debug)]
pub enum Disposition<'a> {
	/// Return the failure unchanged.
	PassThrough(PassThroughReason),
	/// The reissue route itself answered 401: end the session silently, return the failure.
	RefreshFailed,
	/// A reissue is already running: wait for it, then replay.
	Retryable(RefreshWaiter),
	/// This request leads a new reissue cycle.
	RefreshTriggered(RefreshLease<'a>),
}
impl Disposition<'_> {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::PassThrough(reason) => reason.as_str(),
			Self::RefreshFailed => "refresh_failed",
			Self::Retryable(_) => "queued",
			Self::RefreshTriggered(_) => "refresh_triggered",
		}
	}
}

/// Classifies a non-success response to `request`.
///
/// Rules apply in order and the first match wins. The last two consult `gate`, so the leader
/// lease (or the waiter slot) is taken here, synchronously, before the caller awaits anything.
pub fn classify<'a>(
	descriptor: &ClientDescriptor,
	gate: &'a RefreshGate,
	request: &ApiRequest,
	status: StatusCode,
) -> Disposition<'a> {
	if status != StatusCode::UNAUTHORIZED {
		return Disposition::PassThrough(PassThroughReason::NotUnauthorized);
	}
	if request.is_retried() {
		return Disposition::PassThrough(PassThroughReason::AlreadyRetried);
	}
	if descriptor.excluded.contains(request.method(), request.path()) {
		return Disposition::PassThrough(PassThroughReason::Excluded);
	}
	if descriptor.is_refresh_route(request.method(), request.path()) {
		return Disposition::RefreshFailed;
	}

	match gate.acquire_or_enqueue() {
		Admission::Leader(lease) => Disposition::RefreshTriggered(lease),
		Admission::Waiter(waiter) => Disposition::Retryable(waiter),
	}
}
