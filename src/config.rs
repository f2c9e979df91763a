//! Client descriptor: where the backend lives and which routes manage tokens themselves.
//!
//! The descriptor is plain data (serde-friendly, loadable from JSON) validated by
//! [`ClientDescriptorBuilder::build`] or [`ClientDescriptor::from_json_str`].

/// Builder API for assembling client descriptors.
pub mod builder;
/// Endpoint identifiers and exclusion sets.
pub mod endpoint;

pub use builder::*;
pub use endpoint::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Immutable client configuration consumed by [`crate::client::ApiClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptor {
	/// Origin (and optional path prefix) every request path is resolved against.
	pub base_url: Url,
	/// Dedicated reissue route; answered with `Authorization: Bearer <token>`.
	#[serde(default = "defaults::refresh_endpoint")]
	pub refresh_endpoint: Endpoint,
	/// Route notified when a session ends with server notification.
	#[serde(default = "defaults::logout_endpoint")]
	pub logout_endpoint: Endpoint,
	/// Routes whose 401 responses never trigger a reissue.
	#[serde(default = "defaults::excluded")]
	pub excluded: ExcludedEndpoints,
	/// Name of the storage slot holding the raw access token.
	#[serde(default = "defaults::token_storage_key")]
	pub token_storage_key: String,
}
impl ClientDescriptor {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientDescriptorBuilder {
		ClientDescriptorBuilder::new(base_url)
	}

	/// Parses and validates a JSON descriptor; omitted fields take the crate defaults.
	pub fn from_json_str(json: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(json);
		let mut descriptor: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::DescriptorParse { source })?;

		descriptor.base_url = normalize_base(descriptor.base_url);
		descriptor.validate().map_err(ConfigError::from)?;

		Ok(descriptor)
	}

	/// Resolves a request path against the base URL, keeping any base path prefix.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url.join(path.trim_start_matches('/')).map_err(|source| {
			ConfigError::InvalidPath { path: path.to_owned(), source }
		})
	}

	/// Returns `true` when the route is the dedicated reissue endpoint.
	pub fn is_refresh_route(&self, method: &Method, path: &str) -> bool {
		self.refresh_endpoint.matches(method, path)
	}
}

pub(crate) mod defaults {
	// self
	use crate::config::{Endpoint, ExcludedEndpoints};

	pub const REFRESH: &str = "/api/auth/reissue";
	pub const LOGOUT: &str = "/api/auth/logout";
	pub const SIGN_UP: &str = "/api/members";
	pub const TOKEN_STORAGE_KEY: &str = "accessToken";

	pub fn refresh_endpoint() -> Endpoint {
		post(REFRESH)
	}

	pub fn logout_endpoint() -> Endpoint {
		post(LOGOUT)
	}

	pub fn excluded() -> ExcludedEndpoints {
		[post(SIGN_UP)].into_iter().collect()
	}

	pub fn token_storage_key() -> String {
		TOKEN_STORAGE_KEY.into()
	}

	fn post(path: &'static str) -> Endpoint {
		Endpoint::trusted(http::Method::POST, path)
	}
}

fn normalize_base(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}
