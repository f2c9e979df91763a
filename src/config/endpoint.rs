//! `METHOD /path` endpoint identifiers and the exclusion set built from them.

// std
use std::cmp::Ordering;
// self
use crate::{_prelude::*, config::ClientDescriptorError};

/// A method + path pair naming one backend route.
///
/// Serialized as the string `"METHOD /path"`, e.g. `"POST /api/members"`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
	method: Method,
	path: String,
}
impl Endpoint {
	/// Creates an endpoint after validating the path.
	pub fn new(method: Method, path: impl Into<String>) -> Result<Self, ClientDescriptorError> {
		let path = path.into();

		validate_path(&path)?;

		Ok(Self { method, path })
	}

	pub(crate) fn trusted(method: Method, path: &'static str) -> Self {
		Self { method, path: path.into() }
	}

	/// HTTP method of the route.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Absolute path of the route (no query string).
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Returns `true` when `method` + `path` address this route; any query string is ignored.
	pub fn matches(&self, method: &Method, path: &str) -> bool {
		let route = path.split_once('?').map_or(path, |(route, _)| route);

		self.method == *method && self.path == route
	}
}
impl Debug for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Endpoint({} {})", self.method, self.path)
	}
}
impl Display for Endpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}", self.method, self.path)
	}
}
impl FromStr for Endpoint {
	type Err = ClientDescriptorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let invalid = |reason: &'static str| ClientDescriptorError::InvalidEndpoint {
			value: s.to_owned(),
			reason,
		};
		let (method, path) =
			s.trim().split_once(' ').ok_or_else(|| invalid("expected `METHOD /path`"))?;
		let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
			.map_err(|_| invalid("unknown HTTP method"))?;

		Self::new(method, path.trim())
	}
}
impl TryFrom<String> for Endpoint {
	type Error = ClientDescriptorError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<Endpoint> for String {
	fn from(value: Endpoint) -> Self {
		value.to_string()
	}
}
impl PartialOrd for Endpoint {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
impl Ord for Endpoint {
	fn cmp(&self, other: &Self) -> Ordering {
		let lhs = (self.path.as_str(), self.method.as_str());

		lhs.cmp(&(other.path.as_str(), other.method.as_str()))
	}
}

/// Routes whose 401 responses are handed back untouched instead of triggering a reissue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedEndpoints(BTreeSet<Endpoint>);
impl ExcludedEndpoints {
	/// Creates an empty exclusion set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a route; returns `false` when it was already present.
	pub fn insert(&mut self, endpoint: Endpoint) -> bool {
		self.0.insert(endpoint)
	}

	/// Returns `true` when the request addresses an excluded route.
	pub fn contains(&self, method: &Method, path: &str) -> bool {
		self.0.iter().any(|endpoint| endpoint.matches(method, path))
	}

	/// Iterates over the excluded routes in a stable order.
	pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
		self.0.iter()
	}

	/// Number of excluded routes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when nothing is excluded.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl FromIterator<Endpoint> for ExcludedEndpoints {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = Endpoint>,
	{
		Self(iter.into_iter().collect())
	}
}

fn validate_path(path: &str) -> Result<(), ClientDescriptorError> {
	let invalid =
		|reason| ClientDescriptorError::InvalidEndpoint { value: path.to_owned(), reason };

	if !path.starts_with('/') {
		return Err(invalid("path must start with `/`"));
	}
	if path.contains('?') || path.contains('#') {
		return Err(invalid("path must not carry a query or fragment"));
	}
	if path.chars().any(char::is_whitespace) {
		return Err(invalid("path contains whitespace"));
	}

	Ok(())
}
