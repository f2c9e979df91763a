//! Reissue-and-replay paths taken after a 401.

// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	client::ApiClient,
	error::StatusError,
	obs::{self, CallOutcome, CallSpan, CallStage},
	refresh::{Admission, RefreshError, RefreshLease, RefreshWaiter},
	request::{ApiRequest, ApiResponse},
	transport::Transport,
};

impl<T> ApiClient<T>
where
	T: ?Sized + Transport,
{
	/// Runs the reissue as the cycle leader, settles the lease, then replays `request`.
	pub(super) async fn lead_refresh(
		&self,
		mut request: ApiRequest,
		lease: RefreshLease<'_>,
		status: StatusCode,
	) -> Result<ApiResponse> {
		request.mark_retried();

		match self.reissue().await {
			Ok(token) => {
				if let Err(err) = self.store.set(&token) {
					obs::log_swallowed(CallStage::Refresh, "token store write failed", &err);
				}
				if let Err(err) = self.session.update_token(&token).await {
					obs::log_swallowed(CallStage::Refresh, "session token update failed", &err);
				}

				lease.settle(Ok(token.clone()));
				self.refresh_metrics.record_success();

				self.replay(request, &token).await
			},
			Err(cause) => {
				lease.settle(Err(cause.clone()));
				self.refresh_metrics.record_failure();
				self.end_session(cause.notifies_server()).await;

				Err(Error::Refresh { status: status.as_u16(), cause })
			},
		}
	}

	/// Waits for the running reissue, then replays `request` with its token.
	///
	/// A cycle abandoned by a cancelled leader decides nothing about the session, so the request
	/// goes back through the gate and either leads the next cycle or waits for it.
	pub(super) async fn await_refresh(
		&self,
		mut request: ApiRequest,
		mut waiter: RefreshWaiter,
		status: StatusCode,
	) -> Result<ApiResponse> {
		loop {
			self.refresh_metrics.record_queued();
			obs::record_call_outcome(CallStage::Refresh, CallOutcome::Queued);

			match waiter.wait().await {
				Ok(token) => {
					request.mark_retried();

					return self.replay(request, &token).await;
				},
				Err(RefreshError::Abandoned) => {
					obs::log_disposition(CallStage::Refresh, request.path(), "abandoned");

					match self.gate.acquire_or_enqueue() {
						Admission::Leader(lease) =>
							return self.lead_refresh(request, lease, status).await,
						Admission::Waiter(next) => waiter = next,
					}
				},
				Err(cause) => return Err(Error::Refresh { status: status.as_u16(), cause }),
			}
		}
	}

	/// Ends the session; collaborator failures are logged, never surfaced.
	pub(super) async fn end_session(&self, notify_server: bool) {
		if let Err(err) = self.session.logout(notify_server).await {
			obs::log_swallowed(CallStage::Logout, "session logout failed", &err);
		}
	}

	/// Calls the reissue route through the raw transport, bypassing classification.
	///
	/// The call carries the current bearer token; the refresh credential itself travels as a
	/// cookie managed by the transport.
	async fn reissue(&self) -> Result<BearerToken, RefreshError> {
		const STAGE: CallStage = CallStage::Refresh;

		let endpoint = &self.descriptor().refresh_endpoint;
		let span = CallSpan::new(STAGE, endpoint.path());
		let mut call = ApiRequest::new(endpoint.method().clone(), endpoint.path());

		obs::record_call_outcome(STAGE, CallOutcome::Attempt);
		self.refresh_metrics.record_attempt();
		self.authenticate(&mut call);

		let result = span
			.instrument(async {
				let response = self
					.transport
					.send(&call)
					.await
					.map_err(|err| RefreshError::Transport { message: err.to_string() })?;
				let status = response.status();

				if status == StatusCode::UNAUTHORIZED {
					return Err(RefreshError::Rejected { status: status.as_u16() });
				}
				if !status.is_success() {
					return Err(RefreshError::Status { status: status.as_u16() });
				}

				BearerToken::from_headers(response.headers()).ok_or(RefreshError::MissingToken)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(STAGE, CallOutcome::Success),
			Err(err) => {
				obs::log_swallowed(STAGE, "token reissue failed", err);
				obs::record_call_outcome(STAGE, CallOutcome::Failure);
			},
		}

		result
	}

	/// Resends `request` once with `token`; whatever comes back is final.
	async fn replay(&self, mut request: ApiRequest, token: &BearerToken) -> Result<ApiResponse> {
		const STAGE: CallStage = CallStage::Replay;

		let span = CallSpan::new(STAGE, request.path());

		obs::record_call_outcome(STAGE, CallOutcome::Attempt);
		request.set_authorization(token.header_value()?);

		let result = span
			.instrument(async {
				let response = self.transport.send(&request).await?;

				if response.status().is_success() {
					Ok(response)
				} else {
					obs::log_disposition(STAGE, request.path(), "already_retried");

					Err(StatusError::new(response).into())
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(STAGE, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(STAGE, CallOutcome::Failure),
		}

		result
	}
}
