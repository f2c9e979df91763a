//! Client-level error types shared across the transport, coordinator, stores, and sessions.

// self
use crate::{_prelude::*, refresh::RefreshError, request::ApiResponse};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (DNS, TCP, TLS, body read).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The server answered with a non-success status.
	#[error(transparent)]
	Status(#[from] StatusError),

	/// The request was rejected and the access token could not be reissued.
	#[error("Request failed with status {status} and the access token could not be reissued.")]
	Refresh {
		/// Status of the request that triggered (or waited on) the reissue.
		status: u16,
		/// Reason the reissue failed.
		#[source]
		cause: RefreshError,
	},
	/// Response body did not match the expected JSON shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status attached to the failure, if the server produced one.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Status(err) => Some(err.status()),
			Self::Refresh { status, .. } => StatusCode::from_u16(*status).ok(),
			_ => None,
		}
	}

	/// Returns `true` when the session was torn down because reissuing failed.
	///
	/// An abandoned cycle never ended the session, so it does not count.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::Refresh { cause, .. } if *cause != RefreshError::Abandoned)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::config::ClientDescriptorError),
	/// Descriptor document could not be parsed.
	#[error("Client descriptor could not be parsed.")]
	DescriptorParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains characters HTTP does not allow.
	#[error("Header value for `{name}` is invalid.")]
	InvalidHeader {
		/// Header name that failed.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO); the request produced no response.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// The request could not be turned into a wire request.
	#[error(transparent)]
	Build(#[from] ConfigError),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-success response surfaced to the caller, with the full response preserved.
#[derive(Debug, ThisError)]
#[error("Server answered {}.", describe_status(.response))]
pub struct StatusError {
	response: ApiResponse,
}
impl StatusError {
	/// Wraps a non-success response.
	pub fn new(response: ApiResponse) -> Self {
		Self { response }
	}

	/// Status code returned by the server.
	pub fn status(&self) -> StatusCode {
		self.response.status()
	}

	/// Borrows the failing response (headers and body).
	pub fn response(&self) -> &ApiResponse {
		&self.response
	}

	/// Consumes the error and returns the failing response.
	pub fn into_response(self) -> ApiResponse {
		self.response
	}
}

fn describe_status(response: &ApiResponse) -> String {
	let status = response.status();

	format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_error_reports_code_and_reason() {
		let err = StatusError::new(ApiResponse::from_parts(
			StatusCode::UNAUTHORIZED,
			HeaderMap::new(),
			b"expired".to_vec(),
		));

		assert_eq!(err.to_string(), "Server answered 401 Unauthorized.");
		assert_eq!(err.response().body(), b"expired");

		let error = Error::from(err);

		assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
		assert!(!error.is_session_expired());
	}

	#[test]
	fn refresh_error_exposes_cause_as_source() {
		let error = Error::Refresh { status: 401, cause: RefreshError::MissingToken };

		assert!(error.is_session_expired());
		assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));

		let source = StdError::source(&error)
			.expect("Refresh error should expose the reissue failure as its source.");

		assert_eq!(source.to_string(), RefreshError::MissingToken.to_string());

		let abandoned = Error::Refresh { status: 401, cause: RefreshError::Abandoned };

		assert!(!abandoned.is_session_expired());
	}
}
