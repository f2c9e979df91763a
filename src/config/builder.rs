// self
use crate::{
	_prelude::*,
	config::{ClientDescriptor, Endpoint, ExcludedEndpoints, defaults, normalize_base},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientDescriptorError {
	/// Endpoint string or path is malformed.
	#[error("Endpoint `{value}` is invalid: {reason}.")]
	InvalidEndpoint {
		/// Offending input.
		value: String,
		/// What was wrong with it.
		reason: &'static str,
	},
	/// Base URL must use HTTP(S).
	#[error("The base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Base URL that failed validation.
		url: String,
	},
	/// Base URL must not carry a query or fragment.
	#[error("The base URL must not carry a query or fragment: {url}.")]
	BaseWithQuery {
		/// Base URL that failed validation.
		url: String,
	},
	/// The token storage slot needs a name.
	#[error("Token storage key cannot be empty.")]
	EmptyStorageKey,
	/// Excluding the reissue route would stop its 401 from ending the session.
	#[error("The refresh endpoint `{endpoint}` cannot be excluded.")]
	RefreshEndpointExcluded {
		/// Refresh endpoint label.
		endpoint: String,
	},
}

/// Builder for [`ClientDescriptor`] values.
#[derive(Debug)]
pub struct ClientDescriptorBuilder {
	/// Base URL requests are resolved against.
	pub base_url: Url,
	/// Dedicated reissue route.
	pub refresh_endpoint: Endpoint,
	/// Logout notification route.
	pub logout_endpoint: Endpoint,
	/// Routes exempt from reissue on 401.
	pub excluded: ExcludedEndpoints,
	/// Storage slot name for the raw token.
	pub token_storage_key: String,
}
impl ClientDescriptorBuilder {
	/// Creates a new builder seeded with the crate defaults.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			refresh_endpoint: defaults::refresh_endpoint(),
			logout_endpoint: defaults::logout_endpoint(),
			excluded: defaults::excluded(),
			token_storage_key: defaults::token_storage_key(),
		}
	}

	/// Sets the dedicated reissue route.
	pub fn refresh_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.refresh_endpoint = endpoint;

		self
	}

	/// Sets the logout notification route.
	pub fn logout_endpoint(mut self, endpoint: Endpoint) -> Self {
		self.logout_endpoint = endpoint;

		self
	}

	/// Adds a single route to the exclusion set.
	pub fn exclude(mut self, endpoint: Endpoint) -> Self {
		self.excluded.insert(endpoint);

		self
	}

	/// Replaces the exclusion set.
	pub fn excluded<I>(mut self, endpoints: I) -> Self
	where
		I: IntoIterator<Item = Endpoint>,
	{
		self.excluded = endpoints.into_iter().collect();

		self
	}

	/// Overrides the token storage slot name.
	pub fn token_storage_key(mut self, key: impl Into<String>) -> Self {
		self.token_storage_key = key.into();

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ClientDescriptor, ClientDescriptorError> {
		let descriptor = ClientDescriptor {
			base_url: normalize_base(self.base_url),
			refresh_endpoint: self.refresh_endpoint,
			logout_endpoint: self.logout_endpoint,
			excluded: self.excluded,
			token_storage_key: self.token_storage_key,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ClientDescriptor {
	/// Validates invariants for the descriptor.
	pub(crate) fn validate(&self) -> Result<(), ClientDescriptorError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ClientDescriptorError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.query().is_some() || self.base_url.fragment().is_some() {
			return Err(ClientDescriptorError::BaseWithQuery { url: self.base_url.to_string() });
		}
		if self.token_storage_key.trim().is_empty() {
			return Err(ClientDescriptorError::EmptyStorageKey);
		}
		if self.excluded.iter().any(|endpoint| *endpoint == self.refresh_endpoint) {
			return Err(ClientDescriptorError::RefreshEndpointExcluded {
				endpoint: self.refresh_endpoint.to_string(),
			});
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://market.example.com").expect("Base URL fixture should parse.")
	}

	#[test]
	fn builder_applies_overrides() {
		let descriptor = ClientDescriptor::builder(base())
			.refresh_endpoint("GET /api/token".parse().expect("Endpoint should parse."))
			.exclude("PUT /api/members/password".parse().expect("Endpoint should parse."))
			.token_storage_key("jwt")
			.build()
			.expect("Descriptor should build.");

		assert!(descriptor.is_refresh_route(&Method::GET, "/api/token"));
		assert_eq!(descriptor.excluded.len(), 2);
		assert_eq!(descriptor.token_storage_key, "jwt");
	}

	#[test]
	fn builder_rejects_invalid_combinations() {
		let ftp = Url::parse("ftp://market.example.com").expect("URL fixture should parse.");

		assert!(matches!(
			ClientDescriptor::builder(ftp).build(),
			Err(ClientDescriptorError::UnsupportedScheme { .. })
		));
		assert_eq!(
			ClientDescriptor::builder(base()).token_storage_key(" ").build(),
			Err(ClientDescriptorError::EmptyStorageKey)
		);

		let refresh = defaults::refresh_endpoint();

		assert!(matches!(
			ClientDescriptor::builder(base()).exclude(refresh).build(),
			Err(ClientDescriptorError::RefreshEndpointExcluded { .. })
		));
	}

	#[test]
	fn excluded_can_be_cleared() {
		let descriptor = ClientDescriptor::builder(base())
			.excluded(Vec::new())
			.build()
			.expect("Descriptor without exclusions should build.");

		assert!(descriptor.excluded.is_empty());
	}
}
