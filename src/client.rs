//! Authenticated API client.
//!
//! [`ApiClient::request`] injects the stored bearer token, sends the request, and hands any
//! non-success response to [`classify`]. A 401 on a protected route either starts a token reissue
//! or waits for the one already running; both paths replay the request once with the new token.
//! When the reissue fails the session is ended and every participant receives
//! [`Error::Refresh`].

mod classify;
mod recovery;

pub use classify::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::AuthSession,
	config::ClientDescriptor,
	error::StatusError,
	obs::{self, CallOutcome, CallSpan, CallStage},
	refresh::{RefreshGate, RefreshMetrics},
	request::{ApiRequest, ApiResponse},
	store::TokenStore,
	transport::Transport,
};
#[cfg(feature = "reqwest")]
use crate::{auth::RemoteSession, transport::ReqwestTransport};

/// Client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Coordinates authenticated calls against a single backend.
///
/// Clones share the transport, collaborators, and the reissue gate, so a refresh started through
/// one clone is joined by 401s observed through any other.
pub struct ApiClient<T>
where
	T: ?Sized + Transport,
{
	/// Transport used for normal calls, replays, and the reissue call.
	pub transport: Arc<T>,
	/// Slot holding the current access token.
	pub store: Arc<dyn TokenStore>,
	/// Session notified of reissued tokens and terminal refresh failures.
	pub session: Arc<dyn AuthSession>,
	/// Shared counters for reissue cycles.
	pub refresh_metrics: Arc<RefreshMetrics>,
	descriptor: Arc<ClientDescriptor>,
	gate: Arc<RefreshGate>,
}
impl<T> ApiClient<T>
where
	T: ?Sized + Transport,
{
	/// Creates a client over a caller-provided transport and collaborators.
	pub fn with_transport(
		descriptor: ClientDescriptor,
		transport: impl Into<Arc<T>>,
		store: Arc<dyn TokenStore>,
		session: Arc<dyn AuthSession>,
	) -> Self {
		let refresh_metrics = Arc::new(RefreshMetrics::default());

		Self {
			transport: transport.into(),
			store,
			session,
			gate: Arc::new(RefreshGate::with_metrics(refresh_metrics.clone())),
			refresh_metrics,
			descriptor: Arc::new(descriptor),
		}
	}

	/// Descriptor the client was built with.
	pub fn descriptor(&self) -> &ClientDescriptor {
		&self.descriptor
	}

	/// Reissue coordination state, exposed for inspection.
	pub fn refresh_gate(&self) -> &RefreshGate {
		&self.gate
	}

	/// Sends `request` with the current bearer token, recovering once from an expired token.
	///
	/// Non-success responses that are not recovered surface as [`Error::Status`]; transport
	/// failures surface as [`Error::Transport`]. Intermediate 401s are never surfaced.
	pub async fn request(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		const STAGE: CallStage = CallStage::Request;

		let span = CallSpan::new(STAGE, request.path());

		obs::record_call_outcome(STAGE, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.authenticate(&mut request);

				let response = self.transport.send(&request).await?;
				let status = response.status();

				if status.is_success() {
					return Ok(response);
				}

				let disposition = classify(&self.descriptor, &self.gate, &request, status);

				obs::log_disposition(STAGE, request.path(), disposition.as_str());

				match disposition {
					Disposition::PassThrough(_) => Err(StatusError::new(response).into()),
					Disposition::RefreshFailed => {
						self.end_session(false).await;

						Err(StatusError::new(response).into())
					},
					Disposition::Retryable(waiter) =>
						self.await_refresh(request, waiter, status).await,
					Disposition::RefreshTriggered(lease) =>
						self.lead_refresh(request, lease, status).await,
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(STAGE, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(STAGE, CallOutcome::Failure),
		}

		result
	}

	/// Sends `request` and decodes a successful JSON response body.
	pub async fn fetch_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: DeserializeOwned,
	{
		self.request(request).await?.json()
	}

	/// Attaches `body` as JSON, sends `request`, and decodes the JSON response body.
	pub async fn send_json<B, R>(&self, request: ApiRequest, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: DeserializeOwned,
	{
		self.fetch_json(request.json(body)?).await
	}

	/// Overwrites `Authorization` with the stored token; leaves headers untouched without one.
	fn authenticate(&self, request: &mut ApiRequest) {
		let token = match self.store.get() {
			Ok(token) => token,
			Err(err) => {
				obs::log_swallowed(CallStage::Request, "token store read failed", &err);

				None
			},
		};
		let Some(token) = token else {
			return;
		};

		match token.header_value() {
			Ok(value) => request.set_authorization(value),
			Err(err) => obs::log_swallowed(CallStage::Request, "stored token rejected", &err),
		}
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client with a cookie-enabled reqwest transport and a [`RemoteSession`] sharing
	/// the same transport and store.
	///
	/// The session handle is returned so UI layers can subscribe to auth-state changes.
	pub fn new(
		descriptor: ClientDescriptor,
		store: Arc<dyn TokenStore>,
	) -> Result<(Self, Arc<RemoteSession<ReqwestTransport>>)> {
		let transport = Arc::new(ReqwestTransport::new(descriptor.clone())?);
		let session = Arc::new(RemoteSession::new(
			transport.clone(),
			store.clone(),
			descriptor.logout_endpoint.clone(),
		));
		let client = Self::with_transport(descriptor, transport, store, session.clone());

		Ok((client, session))
	}
}
impl<T> Clone for ApiClient<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			session: self.session.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			descriptor: self.descriptor.clone(),
			gate: self.gate.clone(),
		}
	}
}
impl<T> Debug for ApiClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("descriptor", &self.descriptor)
			.field("refresh_gate", &self.gate)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration;
	// self
	use super::*;
	use crate::{_preludet::*, auth::BearerToken, refresh::RefreshError, store::MemoryStore};

	const REISSUE: &str = "/api/auth/reissue";

	fn bearer(request: &ApiRequest) -> Option<String> {
		request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned)
	}

	/// Protected routes accept only `Bearer T2`.
	fn accepts_t2(request: &ApiRequest) -> ScriptedReply {
		if bearer(request).as_deref() == Some("Bearer T2") {
			Ok(status_response(200))
		} else {
			Ok(status_response(401))
		}
	}

	fn refresh_cause(result: Result<ApiResponse>) -> RefreshError {
		match result {
			Err(Error::Refresh { status: 401, cause }) => cause,
			other => panic!("Expected a refresh failure, got {other:?}."),
		}
	}

	async fn release_after_waiters<T>(client: &ApiClient<T>, hold: &tokio::sync::Notify, n: usize)
	where
		T: ?Sized + Transport,
	{
		while client.refresh_gate().pending_waiters() < n {
			tokio::task::yield_now().await;
		}

		hold.notify_one();
	}

	#[tokio::test]
	async fn authenticated_success_passes_through() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, accepts_t2));
		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T2"));
		let response = client
			.request(ApiRequest::get("/api/commissions"))
			.await
			.expect("Request with a valid token should succeed.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(bearer(&transport.requests()[0]).as_deref(), Some("Bearer T2"));
		assert_eq!(transport.reissue_calls(), 0);
		assert!(session.logouts().is_empty());
	}

	#[tokio::test]
	async fn missing_token_leaves_headers_untouched() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(200))));
		let (client, _store, _session) = build_scripted_client(transport.clone(), None);
		let request = ApiRequest::get("/api/tags")
			.try_header("authorization", "Basic stale")
			.expect("Fixture header should be valid.");

		client.request(request).await.expect("Anonymous request should succeed.");

		assert_eq!(bearer(&transport.requests()[0]).as_deref(), Some("Basic stale"));
	}

	#[tokio::test]
	async fn non_401_and_transport_failures_pass_through() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |request| {
			if request.path() == "/api/carts" {
				Err(crate::error::TransportError::network(std::io::Error::other("offline")))
			} else {
				Ok(status_response(403))
			}
		}));
		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let forbidden = client
			.request(ApiRequest::get("/api/commissions"))
			.await
			.expect_err("403 should surface.");

		assert_eq!(forbidden.status(), Some(StatusCode::FORBIDDEN));
		assert!(matches!(
			client.request(ApiRequest::get("/api/carts")).await,
			Err(Error::Transport(_))
		));
		assert_eq!(transport.reissue_calls(), 0);
		assert!(session.logouts().is_empty());
	}

	#[tokio::test]
	async fn concurrent_401s_share_one_reissue_and_replay_with_new_token() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, accepts_t2));
		let hold = transport.hold_reissue();

		transport.push_reissue(Ok(reissue_response("T2")));

		let (client, store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let (a, b, c, ()) = tokio::join!(
			client.request(ApiRequest::get("/api/commissions")),
			client.request(ApiRequest::get("/api/carts")),
			client.request(ApiRequest::get("/api/tags")),
			release_after_waiters(&client, &hold, 2),
		);

		for result in [a, b, c] {
			assert_eq!(
				result.expect("Every replay should succeed.").status(),
				StatusCode::OK
			);
		}

		assert_eq!(transport.reissue_calls(), 1);
		assert_eq!(store.get(), Ok(Some(BearerToken::new("T2"))));
		assert_eq!(session.updates(), vec!["T2".to_owned()]);
		assert!(session.logouts().is_empty());
		assert!(!client.refresh_gate().is_in_flight());
		assert_eq!(client.refresh_metrics.attempts(), 1);
		assert_eq!(client.refresh_metrics.successes(), 1);
		assert_eq!(client.refresh_metrics.queued(), 2);

		let replays: Vec<_> = transport
			.requests()
			.into_iter()
			.filter(|request| bearer(request).as_deref() == Some("Bearer T2"))
			.map(|request| request.path().to_owned())
			.collect();

		assert_eq!(replays.len(), 3);
	}

	#[tokio::test]
	async fn rejected_reissue_logs_out_silently_and_rejects_waiters() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));
		let hold = transport.hold_reissue();

		transport.push_reissue(Ok(status_response(401)));

		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let (leader, waiter, ()) = tokio::join!(
			client.request(ApiRequest::get("/api/commissions")),
			client.request(ApiRequest::get("/api/carts")),
			release_after_waiters(&client, &hold, 1),
		);

		assert_eq!(refresh_cause(leader), RefreshError::Rejected { status: 401 });
		assert_eq!(refresh_cause(waiter), RefreshError::Rejected { status: 401 });
		assert_eq!(session.logouts(), vec![false]);
		assert_eq!(client.refresh_gate().pending_waiters(), 0);
		assert!(!client.refresh_gate().is_in_flight());
	}

	#[tokio::test]
	async fn failed_reissue_logs_out_with_notification() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));
		let hold = transport.hold_reissue();

		transport.push_reissue(Ok(status_response(500)));

		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let (leader, first, second, ()) = tokio::join!(
			client.request(ApiRequest::get("/api/commissions")),
			client.request(ApiRequest::get("/api/carts")),
			client.request(ApiRequest::delete("/api/carts/3")),
			release_after_waiters(&client, &hold, 2),
		);

		for result in [leader, first, second] {
			assert_eq!(refresh_cause(result), RefreshError::Status { status: 500 });
		}

		assert_eq!(session.logouts(), vec![true]);
		assert_eq!(client.refresh_metrics.failures(), 1);
	}

	#[tokio::test]
	async fn cancelled_leader_hands_the_cycle_to_a_waiter() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, accepts_t2));
		let hold = transport.hold_reissue();

		transport.push_reissue(Ok(reissue_response("T2")));

		let (client, store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let (leader, parked, ()) = tokio::join!(
			tokio::time::timeout(
				Duration::from_millis(50),
				client.request(ApiRequest::get("/api/commissions")),
			),
			client.request(ApiRequest::get("/api/carts")),
			async {
				while transport.reissue_calls() < 2 {
					tokio::time::sleep(Duration::from_millis(5)).await;
				}

				hold.notify_one();
			},
		);

		assert!(leader.is_err(), "The leader should time out while the reissue is held.");
		assert_eq!(
			parked.expect("The parked request should lead the next cycle.").status(),
			StatusCode::OK
		);
		assert_eq!(transport.reissue_calls(), 2);
		assert_eq!(store.get(), Ok(Some(BearerToken::new("T2"))));
		assert!(session.logouts().is_empty());
		assert_eq!(client.refresh_metrics.failures(), 1);
		assert_eq!(client.refresh_metrics.successes(), 1);
		assert!(!client.refresh_gate().is_in_flight());
	}

	#[tokio::test]
	async fn reissue_without_token_header_is_a_failure() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));

		transport.push_reissue(Ok(status_response(200)));

		let (client, store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let result = client.request(ApiRequest::get("/api/commissions")).await;

		assert_eq!(refresh_cause(result), RefreshError::MissingToken);
		assert_eq!(session.logouts(), vec![true]);
		assert_eq!(store.get(), Ok(Some(BearerToken::new("T1"))));
		assert!(session.updates().is_empty());
	}

	#[tokio::test]
	async fn settled_gate_allows_a_new_cycle() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));

		transport.push_reissue(Ok(status_response(503)));

		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));

		refresh_cause(client.request(ApiRequest::get("/api/commissions")).await);

		assert!(!client.refresh_gate().is_in_flight());

		let second = refresh_cause(client.request(ApiRequest::get("/api/commissions")).await);

		assert!(matches!(second, RefreshError::Transport { .. }));
		assert_eq!(transport.reissue_calls(), 2);
		assert_eq!(session.logouts(), vec![true, true]);
	}

	#[tokio::test]
	async fn replayed_401_is_returned_without_second_reissue() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));

		transport.push_reissue(Ok(reissue_response("T2")));

		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let err = client
			.request(ApiRequest::get("/api/resumes"))
			.await
			.expect_err("Replay answering 401 should surface.");

		assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
		assert!(!err.is_session_expired());
		assert_eq!(transport.reissue_calls(), 1);
		assert_eq!(transport.requests().len(), 2);
		assert!(session.logouts().is_empty());
	}

	#[tokio::test]
	async fn excluded_route_401_is_returned_as_is() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |_| Ok(status_response(401))));
		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let err = client
			.request(ApiRequest::post("/api/members"))
			.await
			.expect_err("Sign-up 401 should surface.");

		assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
		assert!(!err.is_session_expired());
		assert_eq!(transport.reissue_calls(), 0);
		assert!(!client.refresh_gate().is_in_flight());
		assert!(session.logouts().is_empty());
	}

	#[tokio::test]
	async fn caller_hitting_reissue_route_logs_out_silently() {
		let transport = Arc::new(ScriptedTransport::new("/never", |_| Ok(status_response(401))));
		let (client, _store, session) = build_scripted_client(transport.clone(), Some("T1"));
		let err = client
			.request(ApiRequest::post(REISSUE))
			.await
			.expect_err("Reissue route 401 should surface.");

		assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
		assert_eq!(session.logouts(), vec![false]);
		assert!(!client.refresh_gate().is_in_flight());
		assert_eq!(client.refresh_gate().pending_waiters(), 0);
	}

	#[tokio::test]
	async fn failing_session_callbacks_do_not_block_recovery() {
		let transport = Arc::new(ScriptedTransport::new(REISSUE, |request| {
			if request.path() == "/api/resumes" {
				Ok(status_response(401))
			} else {
				accepts_t2(request)
			}
		}));

		transport.push_reissue(Ok(reissue_response("T2")));

		let store = Arc::new(MemoryStore::with_token(BearerToken::new("T1")));
		let client: ApiClient<ScriptedTransport> = ApiClient::with_transport(
			test_descriptor("https://market.example.com"),
			transport.clone(),
			store.clone(),
			Arc::new(FailingSession),
		);
		let response = client
			.request(ApiRequest::get("/api/commissions"))
			.await
			.expect("A failing update callback should not abort the replay.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(store.get(), Ok(Some(BearerToken::new("T2"))));
		assert!(!client.refresh_gate().is_in_flight());

		let cause = refresh_cause(client.request(ApiRequest::get("/api/resumes")).await);

		assert!(matches!(cause, RefreshError::Transport { .. }));
		assert!(!client.refresh_gate().is_in_flight());
		assert_eq!(transport.reissue_calls(), 2);
	}

	#[tokio::test]
	async fn send_json_round_trips_bodies() {
		#[derive(Debug, PartialEq, Serialize, Deserialize)]
		struct Rating {
			score: u8,
		}

		let transport = Arc::new(ScriptedTransport::new(REISSUE, |request| {
			Ok(ApiResponse::from_parts(
				StatusCode::CREATED,
				HeaderMap::new(),
				request.body().map(<[u8]>::to_vec).unwrap_or_default(),
			))
		}));
		let (client, _store, _session) = build_scripted_client(transport, Some("T1"));
		let echoed: Rating = client
			.send_json(ApiRequest::post("/api/ratings"), &Rating { score: 5 })
			.await
			.expect("JSON round trip should succeed.");

		assert_eq!(echoed, Rating { score: 5 });
	}
}
