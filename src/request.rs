//! Request descriptors and buffered responses exchanged with a [`crate::transport::Transport`].

// crates.io
use http::header::HeaderName;
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, StatusError},
};

/// Description of one outbound call.
///
/// The client owns two pieces of it: the `Authorization` header, which it overwrites with the
/// current bearer token, and the `retried` flag, which it sets once before the single replay a
/// request is allowed.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	path: String,
	headers: HeaderMap,
	body: Option<Vec<u8>>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request for `path` (relative to the descriptor's base URL, query allowed).
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds (or replaces) a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Adds (or replaces) a header from string parts.
	pub fn try_header(self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let invalid = || ConfigError::InvalidHeader { name: name.to_owned() };
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
		let value = HeaderValue::from_str(value).map_err(|_| invalid())?;

		Ok(self.with_header(name, value))
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `body` as JSON and sets `Content-Type: application/json`.
	pub fn json<T>(self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ConfigError::BodySerialize)?;

		Ok(self
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(bytes))
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Path (and query) relative to the base URL.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Request headers, including the injected `Authorization` once authenticated.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Request body, if any.
	pub fn body(&self) -> Option<&[u8]> {
		self.body.as_deref()
	}

	/// Whether this request already used its single reissue-and-replay cycle.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Overwrites the `Authorization` header.
	pub fn set_authorization(&mut self, value: HeaderValue) {
		self.headers.insert(AUTHORIZATION, value);
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl ApiResponse {
	/// Assembles a response from its parts.
	pub fn from_parts(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// Status code.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Raw body bytes.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the failing field path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::Decode { source })
	}

	/// Splits success from failure: non-2xx responses become a [`StatusError`].
	pub fn error_for_status(self) -> Result<Self, StatusError> {
		if self.status.is_success() { Ok(self) } else { Err(StatusError::new(self)) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Commission {
		id: u64,
		title: String,
	}

	#[test]
	fn json_body_sets_content_type() {
		let request = ApiRequest::post("/api/commissions")
			.json(&Commission { id: 7, title: "Logo design".into() })
			.expect("Commission should serialize.");

		assert_eq!(
			request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
		assert_eq!(request.body(), Some(&br#"{"id":7,"title":"Logo design"}"#[..]));
		assert!(!request.is_retried());
	}

	#[test]
	fn try_header_rejects_invalid_values() {
		assert!(ApiRequest::get("/api/tags").try_header("x-trace", "a\nb").is_err());
		assert!(ApiRequest::get("/api/tags").try_header("bad name", "v").is_err());

		let request = ApiRequest::get("/api/tags")
			.try_header("x-trace", "abc")
			.expect("Header should be valid.");

		assert_eq!(request.headers().get("x-trace").and_then(|v| v.to_str().ok()), Some("abc"));
	}

	#[test]
	fn json_decode_reports_path() {
		let response = ApiResponse::from_parts(
			StatusCode::OK,
			HeaderMap::new(),
			br#"{"id":"seven","title":"Logo"}"#.to_vec(),
		);
		let err = response.json::<Commission>().expect_err("String id should not decode.");

		match err {
			Error::Decode { source } => assert_eq!(source.path().to_string(), "id"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn error_for_status_splits_failures() {
		let ok = ApiResponse::from_parts(StatusCode::CREATED, HeaderMap::new(), Vec::new());
		let failed = ApiResponse::from_parts(StatusCode::CONFLICT, HeaderMap::new(), Vec::new());

		assert!(ok.error_for_status().is_ok());
		assert_eq!(
			failed.error_for_status().expect_err("409 should be an error.").status(),
			StatusCode::CONFLICT
		);
	}
}
