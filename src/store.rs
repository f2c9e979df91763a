//! Access-token slot contract and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::BearerToken};

/// Single-slot storage for the raw (unprefixed) access token.
///
/// Calls are synchronous and short: the client reads the slot before every request and writes
/// it only after a successful reissue.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the stored token, if present.
	fn get(&self) -> Result<Option<BearerToken>, StoreError>;

	/// Persists or replaces the token.
	fn set(&self, token: &BearerToken) -> Result<(), StoreError>;

	/// Clears the slot; clearing an empty slot is not an error.
	fn remove(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
