//! Opaque bearer token wrapper that redacts sensitive material.

// self
use crate::_prelude::*;

/// Scheme prefix carried by `Authorization` headers and tolerated in storage.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Redacted access token wrapper keeping sensitive material out of logs.
///
/// The client never inspects the token beyond stripping a [`BEARER_PREFIX`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);
impl BearerToken {
	/// Wraps a raw (unprefixed) token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Parses a possibly prefixed value, returning `None` for empty tokens.
	///
	/// The prefix match is case-insensitive, matching how servers echo the scheme.
	pub fn parse(raw: &str) -> Option<Self> {
		let raw = raw.trim_start();
		let stripped = match raw.get(..BEARER_PREFIX.len()) {
			Some(head) if head.eq_ignore_ascii_case(BEARER_PREFIX) => &raw[BEARER_PREFIX.len()..],
			_ => raw,
		}
		.trim();

		if stripped.is_empty() { None } else { Some(Self(stripped.to_owned())) }
	}

	/// Reads the token out of an `Authorization: Bearer <token>` response header.
	pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
		let value = headers.get(AUTHORIZATION)?.to_str().ok()?;

		Self::parse(value)
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `Authorization` header value for this token.
	pub fn header_value(&self) -> Result<HeaderValue, crate::error::ConfigError> {
		let mut value =
			HeaderValue::from_str(&format!("{BEARER_PREFIX}{}", self.0)).map_err(|_| {
				crate::error::ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() }
			})?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl AsRef<str> for BearerToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerToken").field(&"<redacted>").finish()
	}
}
impl Display for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
