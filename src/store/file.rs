//! File-backed [`TokenStore`] that mimics a browser key/value storage area.
//!
//! The file holds a flat JSON object; this store owns a single named slot in it and leaves every
//! other key untouched.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	store::{StoreError, TokenStore},
};

type Slots = HashMap<String, String>;

/// Persists the token slot to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	key: String,
	inner: Arc<RwLock<Slots>>,
}
impl FileStore {
	/// Opens (or creates) a store at `path` owning the slot named `key`, eagerly loading data.
	pub fn open(path: impl Into<PathBuf>, key: impl Into<String>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, key: key.into(), inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Name of the slot this store owns.
	pub fn key(&self) -> &str {
		&self.key
	}

	fn load_snapshot(path: &Path) -> Result<Slots, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &Slots) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenStore for FileStore {
	fn get(&self) -> Result<Option<BearerToken>, StoreError> {
		Ok(self.inner.read().get(&self.key).and_then(|raw| BearerToken::parse(raw)))
	}

	fn set(&self, token: &BearerToken) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.insert(self.key.clone(), token.expose().to_owned());

		self.persist_locked(&guard)
	}

	fn remove(&self) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		if guard.remove(&self.key).is_none() {
			return Ok(());
		}

		self.persist_locked(&guard)
	}
}
