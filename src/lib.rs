//! Authenticated API client for the marketplace backend.
//!
//! Every request carries the stored bearer token. When protected calls start failing with 401,
//! one of them reissues the token while the others wait, and all of them are replayed once with
//! the new token. A failed reissue ends the session.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod obs;
pub mod refresh;
pub mod request;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::{AuthSession, BearerToken, SessionError, SessionFuture},
		client::ApiClient,
		config::ClientDescriptor,
		error::TransportError,
		request::{ApiRequest, ApiResponse},
		store::{MemoryStore, TokenStore},
		transport::{Transport, TransportFuture},
	};

	/// Session double that records every callback it receives.
	#[derive(Debug, Default)]
	pub struct RecordingSession {
		logouts: Mutex<Vec<bool>>,
		updates: Mutex<Vec<String>>,
	}
	impl RecordingSession {
		/// Returns the `notify_server` flag of every logout call, in call order.
		pub fn logouts(&self) -> Vec<bool> {
			self.logouts.lock().clone()
		}

		/// Returns every token pushed through `update_token`, in call order.
		pub fn updates(&self) -> Vec<String> {
			self.updates.lock().clone()
		}
	}
	impl AuthSession for RecordingSession {
		fn logout(&self, notify_server: bool) -> SessionFuture<'_> {
			self.logouts.lock().push(notify_server);

			Box::pin(async { Ok(()) })
		}

		fn update_token<'a>(&'a self, token: &'a BearerToken) -> SessionFuture<'a> {
			self.updates.lock().push(token.expose().to_owned());

			Box::pin(async { Ok(()) })
		}
	}

	/// Session double whose callbacks always fail, used to prove cleanup still runs.
	#[derive(Debug, Default)]
	pub struct FailingSession;
	impl AuthSession for FailingSession {
		fn logout(&self, _notify_server: bool) -> SessionFuture<'_> {
			Box::pin(async {
				Err(SessionError::Logout { message: "session backend unavailable".into() })
			})
		}

		fn update_token<'a>(&'a self, _token: &'a BearerToken) -> SessionFuture<'a> {
			Box::pin(async {
				Err(SessionError::Update { message: "session backend unavailable".into() })
			})
		}
	}

	/// Response a [`ScriptedTransport`] hands back for a single call.
	pub type ScriptedReply = Result<ApiResponse, TransportError>;

	type Responder = dyn Fn(&ApiRequest) -> ScriptedReply + Send + Sync;

	/// In-process transport driven by a closure; records every request it sees.
	///
	/// Calls to the reissue path can be held back with [`ScriptedTransport::hold_reissue`] so
	/// tests can pile up concurrent 401s while a refresh is in flight.
	pub struct ScriptedTransport {
		reissue_path: String,
		responder: Box<Responder>,
		seen: Mutex<Vec<ApiRequest>>,
		reissue_calls: AtomicUsize,
		reissue_gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
		reissue_replies: Mutex<VecDeque<ScriptedReply>>,
	}
	impl ScriptedTransport {
		/// Creates a transport that answers protected calls with `responder` and reissue calls
		/// with the queued reissue replies.
		pub fn new(
			reissue_path: impl Into<String>,
			responder: impl Fn(&ApiRequest) -> ScriptedReply + 'static + Send + Sync,
		) -> Self {
			Self {
				reissue_path: reissue_path.into(),
				responder: Box::new(responder),
				seen: Default::default(),
				reissue_calls: Default::default(),
				reissue_gate: Default::default(),
				reissue_replies: Default::default(),
			}
		}

		/// Queues the reply for the next reissue call.
		pub fn push_reissue(&self, reply: ScriptedReply) {
			self.reissue_replies.lock().push_back(reply);
		}

		/// Blocks reissue calls until the returned [`tokio::sync::Notify`] is signalled.
		pub fn hold_reissue(&self) -> Arc<tokio::sync::Notify> {
			let notify = Arc::new(tokio::sync::Notify::new());

			*self.reissue_gate.lock() = Some(notify.clone());

			notify
		}

		/// Number of reissue calls dispatched so far.
		pub fn reissue_calls(&self) -> usize {
			self.reissue_calls.load(Ordering::SeqCst)
		}

		/// Snapshot of every non-reissue request the transport received, in order.
		pub fn requests(&self) -> Vec<ApiRequest> {
			self.seen.lock().clone()
		}
	}
	impl Debug for ScriptedTransport {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("ScriptedTransport")
				.field("reissue_path", &self.reissue_path)
				.field("reissue_calls", &self.reissue_calls())
				.finish()
		}
	}
	impl Transport for ScriptedTransport {
		fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
			Box::pin(async move {
				if request.path() == self.reissue_path {
					self.reissue_calls.fetch_add(1, Ordering::SeqCst);

					let gate = self.reissue_gate.lock().clone();

					if let Some(gate) = gate {
						gate.notified().await;
					}

					return self.reissue_replies.lock().pop_front().unwrap_or_else(|| {
						Err(TransportError::network(std::io::Error::other("no scripted reply")))
					});
				}

				self.seen.lock().push(request.clone());

				(self.responder)(request)
			})
		}
	}

	/// Builds a descriptor pointing at `base_url` with the crate defaults for every endpoint.
	pub fn test_descriptor(base_url: &str) -> ClientDescriptor {
		ClientDescriptor::builder(
			Url::parse(base_url).expect("Test base URL should parse successfully."),
		)
		.build()
		.expect("Test descriptor should build successfully.")
	}

	/// Builds a response with the provided status and an empty body.
	pub fn status_response(status: u16) -> ApiResponse {
		ApiResponse::from_parts(
			StatusCode::from_u16(status).expect("Test status code should be valid."),
			HeaderMap::new(),
			Vec::new(),
		)
	}

	/// Builds a successful reissue response carrying `Authorization: Bearer <token>`.
	pub fn reissue_response(token: &str) -> ApiResponse {
		let mut headers = HeaderMap::new();

		headers.insert(
			AUTHORIZATION,
			HeaderValue::from_str(&format!("Bearer {token}"))
				.expect("Test bearer header should be valid."),
		);

		ApiResponse::from_parts(StatusCode::OK, headers, Vec::new())
	}

	/// Constructs an [`ApiClient`] over `transport`, backed by a memory store seeded with
	/// `token` and a [`RecordingSession`].
	pub fn build_scripted_client(
		transport: Arc<ScriptedTransport>,
		token: Option<&str>,
	) -> (ApiClient<ScriptedTransport>, Arc<MemoryStore>, Arc<RecordingSession>) {
		let store_backend = Arc::new(MemoryStore::default());

		if let Some(token) = token {
			store_backend
				.set(&BearerToken::new(token))
				.expect("Seeding the memory store should succeed.");
		}

		let store: Arc<dyn TokenStore> = store_backend.clone();
		let session = Arc::new(RecordingSession::default());
		let session_handle: Arc<dyn AuthSession> = session.clone();
		let client = ApiClient::with_transport(
			test_descriptor("https://market.example.com"),
			transport,
			store,
			session_handle,
		);

		(client, store_backend, session)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use http::{
		HeaderMap, HeaderValue, Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE},
	};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
