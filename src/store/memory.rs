//! Thread-safe in-memory [`TokenStore`] for tests, demos, and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	store::{StoreError, TokenStore},
};

/// Storage backend that keeps the token in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<BearerToken>>>);
impl MemoryStore {
	/// Creates a store pre-seeded with `token`.
	pub fn with_token(token: BearerToken) -> Self {
		Self(Arc::new(RwLock::new(Some(token))))
	}
}
impl TokenStore for MemoryStore {
	fn get(&self) -> Result<Option<BearerToken>, StoreError> {
		Ok(self.0.read().clone())
	}

	fn set(&self, token: &BearerToken) -> Result<(), StoreError> {
		*self.0.write() = Some(token.clone());

		Ok(())
	}

	fn remove(&self) -> Result<(), StoreError> {
		*self.0.write() = None;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_the_slot() {
		let store = MemoryStore::default();
		let view = store.clone();

		assert_eq!(view.get(), Ok(None));

		store.set(&BearerToken::new("t-1")).expect("Memory store writes never fail.");

		assert_eq!(view.get(), Ok(Some(BearerToken::new("t-1"))));

		view.remove().expect("Memory store removals never fail.");
		view.remove().expect("Removing an empty slot is not an error.");

		assert_eq!(store.get(), Ok(None));
	}
}
