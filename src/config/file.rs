//! JSON file-backed [`ConfigProvider`] for lightweight deployments.
//!
//! The document maps bank identifiers to their settings:
//!
//! ```json
//! { "bank-a": { "endpoint.oauth2": "https://bank-a.example/token", "client.id": "tpp-1" } }
//! ```

// std
use std::{
	fs,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::BankId,
	config::{BankSettings, ConfigFuture, ConfigName, ConfigProvider, lookup},
	error::ConfigError,
};

/// Loads bank settings from a JSON document once at construction.
#[derive(Clone, Debug)]
pub struct FileConfig {
	path: PathBuf,
	settings: Arc<BankSettings>,
}
impl FileConfig {
	/// Reads and validates the document at `path`.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let settings = Self::load(&path)?;

		Ok(Self { path, settings: Arc::new(settings) })
	}

	/// Path the settings were loaded from.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(path: &Path) -> Result<BankSettings, ConfigError> {
		let origin = path.display().to_string();
		let bytes = fs::read(path).map_err(|e| ConfigError::load(origin.clone(), e))?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|e| ConfigError::load(origin, e))
	}
}
impl ConfigProvider for FileConfig {
	fn find<'a>(&'a self, bank: &'a BankId, name: ConfigName) -> ConfigFuture<'a, String> {
		Box::pin(async move { lookup(&self.settings, bank, name) })
	}
}
