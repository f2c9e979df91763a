//! Transport primitives: the raw `send` the client builds on.
//!
//! [`Transport`] is the client's only dependency on an HTTP stack. It has no knowledge of
//! tokens: the client authenticates requests before handing them over, and the dedicated reissue
//! call goes straight through it so it never re-enters the 401 interception path.

// self
#[cfg(feature = "reqwest")] use crate::config::ClientDescriptor;
use crate::{
	_prelude::*,
	error::TransportError,
	request::{ApiRequest, ApiResponse},
};

/// Boxed future returned by [`Transport::send`].
///
/// `Ok` carries any response the server produced, whatever its status; `Err` means no response
/// was received at all.
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing one buffered request.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared (behind
/// `Arc`) by the client and its session, and their futures must be `Send` so callers can spawn
/// requests onto a multi-threaded runtime.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` as-is and buffers the response.
	fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] bound to a base URL.
///
/// The default client keeps a cookie store so the HTTP-only refresh cookie set at login rides
/// along on the reissue call. Redirects are not followed: the backend answers API calls directly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	descriptor: Arc<ClientDescriptor>,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a cookie-enabled client for `descriptor`.
	pub fn new(descriptor: ClientDescriptor) -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self::with_client(client, descriptor))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, descriptor: ClientDescriptor) -> Self {
		Self { client, descriptor: Arc::new(descriptor) }
	}

	/// Descriptor the transport resolves paths against.
	pub fn descriptor(&self) -> &ClientDescriptor {
		&self.descriptor
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let url = self.descriptor.resolve(request.path())?;
			let mut builder = self
				.client
				.request(request.method().clone(), url)
				.headers(request.headers().clone());

			if let Some(body) = request.body() {
				builder = builder.body(body.to_vec());
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse::from_parts(status, headers, body))
		})
	}
}
