//! Lazily loaded signing keys, cached for the lifetime of the process.

// std
use std::{fs, path::Path};
// crates.io
use async_lock::OnceCell;
use jsonwebtoken::{DecodingKey, EncodingKey};
// self
use crate::{_prelude::*, error::SigningError};

/// Logical names distinguishing the key material held by a [`Signer`](super::Signer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyName {
	/// RSA private key used for bank-facing JWTs.
	OpenBanking,
	/// Symmetric secret used for internal service tokens.
	Internal,
}
impl KeyName {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			KeyName::OpenBanking => "open-banking",
			KeyName::Internal => "internal",
		}
	}
}
impl Display for KeyName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Symmetric secret prepared for both signing and verification.
#[derive(Clone)]
pub(crate) struct SecretKey {
	pub(crate) encoding: EncodingKey,
	pub(crate) decoding: DecodingKey,
}

/// One-time, concurrency-safe key slots. First access reads and parses the
/// file; later callers get the cached value. There is no expiry.
#[derive(Default)]
pub(crate) struct KeyCache {
	open_banking: OnceCell<EncodingKey>,
	internal: OnceCell<SecretKey>,
}
impl KeyCache {
	pub(crate) async fn open_banking(&self, path: &Path) -> Result<&EncodingKey, SigningError> {
		self.open_banking
			.get_or_try_init(|| async {
				let pem = read_key(KeyName::OpenBanking, path)?;

				EncodingKey::from_rsa_pem(&pem).map_err(|e| key_load(KeyName::OpenBanking, e))
			})
			.await
	}

	pub(crate) async fn internal(&self, path: &Path) -> Result<&SecretKey, SigningError> {
		self.internal
			.get_or_try_init(|| async {
				let secret = read_key(KeyName::Internal, path)?;

				Ok(SecretKey {
					encoding: EncodingKey::from_secret(&secret),
					decoding: DecodingKey::from_secret(&secret),
				})
			})
			.await
	}

	pub(crate) fn is_loaded(&self, key: KeyName) -> bool {
		match key {
			KeyName::OpenBanking => self.open_banking.is_initialized(),
			KeyName::Internal => self.internal.is_initialized(),
		}
	}
}

pub(crate) fn key_load(
	key: KeyName,
	src: impl 'static + Send + Sync + std::error::Error,
) -> SigningError {
	SigningError::KeyLoad { key, source: Box::new(src) }
}

fn read_key(key: KeyName, path: &Path) -> Result<Vec<u8>, SigningError> {
	let bytes = fs::read(path).map_err(|e| key_load(key, e))?;

	#[cfg(feature = "tracing")]
	tracing::debug!(key = key.as_str(), "Loaded signing key material.");

	Ok(bytes)
}
