//! Session collaborator contract plus the built-in implementations.
//!
//! The client reports two events to its session: a reissued token (`update_token`) and a terminal
//! refresh failure (`logout`). [`RemoteSession`] turns those events into an observable
//! [`SessionState`] and notifies the backend on logout exactly once per active session.

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	config::Endpoint,
	obs::{self, CallOutcome, CallSpan, CallStage},
	request::ApiRequest,
	store::{StoreError, TokenStore},
	transport::Transport,
};

/// Boxed future returned by [`AuthSession`] callbacks.
pub type SessionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SessionError>> + 'a + Send>>;

/// Session callbacks consumed by the client.
///
/// Implementations must make `logout` idempotent: the client may call it from several failed
/// requests, or after the session has already ended.
pub trait AuthSession
where
	Self: Send + Sync,
{
	/// Ends the session; `notify_server` is `false` when the server already rejected the
	/// refresh credential and a logout call would be pointless.
	fn logout(&self, notify_server: bool) -> SessionFuture<'_>;

	/// Records a freshly reissued access token. The client awaits this before replaying.
	fn update_token<'a>(&'a self, token: &'a BearerToken) -> SessionFuture<'a>;
}

/// Error type produced by [`AuthSession`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// Logout could not be completed.
	#[error("Logout failed: {message}.")]
	Logout {
		/// Human-readable error payload.
		message: String,
	},
	/// The new token could not be recorded.
	#[error("Token update failed: {message}.")]
	Update {
		/// Human-readable error payload.
		message: String,
	},
}

/// Session that ignores every callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSession;
impl AuthSession for NoopSession {
	fn logout(&self, _notify_server: bool) -> SessionFuture<'_> {
		Box::pin(async { Ok(()) })
	}

	fn update_token<'a>(&'a self, _token: &'a BearerToken) -> SessionFuture<'a> {
		Box::pin(async { Ok(()) })
	}
}

/// Observable authentication state published by [`RemoteSession`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
	/// No token has been seen yet.
	Anonymous,
	/// A token is held; `since` is when it was last stored or reissued.
	Active {
		/// Instant the current token was recorded.
		since: OffsetDateTime,
	},
	/// The session ended.
	LoggedOut {
		/// Instant the session ended.
		at: OffsetDateTime,
		/// Whether the backend acknowledged the logout call.
		notified: bool,
	},
}
impl SessionState {
	/// Returns `true` while a token is held.
	pub fn is_active(&self) -> bool {
		matches!(self, Self::Active { .. })
	}
}

/// Session backed by the client's own transport and token store.
///
/// Transitions are serialized through an async mutex so concurrent logouts collapse into one
/// backend call; UI layers follow the state through [`RemoteSession::subscribe`]. Logout is a
/// no-op only while the session is logged out and the store is empty: a token written after the
/// last logout (normally through [`RemoteSession::sign_in`]) opens a new session.
pub struct RemoteSession<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	store: Arc<dyn TokenStore>,
	logout_endpoint: Endpoint,
	state: watch::Sender<SessionState>,
	transition: AsyncMutex<()>,
}
impl<T> RemoteSession<T>
where
	T: ?Sized + Transport,
{
	/// Creates a session whose initial state reflects whether `store` already holds a token.
	pub fn new(transport: Arc<T>, store: Arc<dyn TokenStore>, logout_endpoint: Endpoint) -> Self {
		let initial = match store.get() {
			Ok(Some(_)) => SessionState::Active { since: OffsetDateTime::now_utc() },
			Ok(None) => SessionState::Anonymous,
			Err(err) => {
				obs::log_swallowed(CallStage::Logout, "token store read failed", &err);

				SessionState::Anonymous
			},
		};
		let (state, _) = watch::channel(initial);

		Self { transport, store, logout_endpoint, state, transition: AsyncMutex::new(()) }
	}

	/// Stores a token obtained at sign-in and marks the session active.
	pub async fn sign_in(&self, token: &BearerToken) -> Result<(), StoreError> {
		let _transition = self.transition.lock().await;

		self.store.set(token)?;
		self.state.send_replace(SessionState::Active { since: OffsetDateTime::now_utc() });

		Ok(())
	}

	/// Returns a snapshot of the current state.
	pub fn state(&self) -> SessionState {
		self.state.borrow().clone()
	}

	/// Subscribes to state transitions.
	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}

	async fn notify_backend(&self, token: Option<BearerToken>) -> bool {
		let span = CallSpan::new(CallStage::Logout, self.logout_endpoint.path());

		obs::record_call_outcome(CallStage::Logout, CallOutcome::Attempt);

		let mut request =
			ApiRequest::new(self.logout_endpoint.method().clone(), self.logout_endpoint.path());

		if let Some(token) = token.as_ref() {
			match token.header_value() {
				Ok(value) => request.set_authorization(value),
				Err(err) => obs::log_swallowed(CallStage::Logout, "bearer header rejected", &err),
			}
		}

		let delivered = match span.instrument(self.transport.send(&request)).await {
			Ok(response) if response.status().is_success() => true,
			Ok(response) => {
				let status = response.status();

				obs::log_swallowed(CallStage::Logout, "backend refused logout", &status);

				false
			},
			Err(err) => {
				obs::log_swallowed(CallStage::Logout, "logout call failed", &err);

				false
			},
		};

		obs::record_call_outcome(
			CallStage::Logout,
			if delivered { CallOutcome::Success } else { CallOutcome::Failure },
		);

		delivered
	}
}
impl<T> AuthSession for RemoteSession<T>
where
	T: ?Sized + Transport,
{
	fn logout(&self, notify_server: bool) -> SessionFuture<'_> {
		Box::pin(async move {
			let _transition = self.transition.lock().await;
			let stored = self.store.get();
			let logged_out = matches!(*self.state.borrow(), SessionState::LoggedOut { .. });

			// A token written after the last logout means a new session began.
			if logged_out && matches!(stored, Ok(None)) {
				return Ok(());
			}

			let token = stored.unwrap_or_else(|err| {
				obs::log_swallowed(CallStage::Logout, "token store read failed", &err);

				None
			});
			let removed = self.store.remove();
			let notified = if notify_server { self.notify_backend(token).await } else { false };

			self.state
				.send_replace(SessionState::LoggedOut { at: OffsetDateTime::now_utc(), notified });

			removed.map_err(|err| SessionError::Logout { message: err.to_string() })
		})
	}

	fn update_token<'a>(&'a self, _token: &'a BearerToken) -> SessionFuture<'a> {
		Box::pin(async move {
			let _transition = self.transition.lock().await;

			self.state.send_replace(SessionState::Active { since: OffsetDateTime::now_utc() });

			Ok(())
		})
	}
}
impl<T> Debug for RemoteSession<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RemoteSession")
			.field("logout_endpoint", &self.logout_endpoint)
			.field("state", &*self.state.borrow())
			.finish()
	}
}
