//! JWT production and verification for request objects and internal tokens.
//!
//! RS256 and PS256 sign with the bank-facing RSA key and stamp the configured
//! `kid` into the header; HS256 signs with the internal secret. Keys are read
//! from disk on first use and cached for the life of the [`Signer`].

pub mod keys;

pub use keys::KeyName;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, crypto,
	errors::ErrorKind as JwtErrorKind,
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, config::SigningConfig, error::SigningError};
use keys::KeyCache;

/// PSS salt length used for PS256 signatures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PssSaltLength {
	/// Salt length equal to the digest length (32 bytes for SHA-256).
	#[default]
	EqualsHash,
}

/// Signs and verifies compact JWTs.
#[derive(Clone)]
pub struct Signer {
	config: SigningConfig,
	pss_salt_length: PssSaltLength,
	keys: Arc<KeyCache>,
}
impl Signer {
	/// Creates a signer; keys are loaded lazily on first use.
	pub fn new(config: SigningConfig) -> Self {
		Self { config, pss_salt_length: PssSaltLength::default(), keys: Default::default() }
	}

	/// Sets the PSS salt length applied to PS256 signatures.
	pub fn with_pss_salt_length(mut self, salt_length: PssSaltLength) -> Self {
		self.pss_salt_length = salt_length;

		self
	}

	/// Key identifier stamped on RSA-signed tokens.
	pub fn kid(&self) -> &str {
		&self.config.kid
	}

	/// Returns `true` once the named key has been read and parsed.
	pub fn is_key_loaded(&self, key: KeyName) -> bool {
		self.keys.is_loaded(key)
	}

	/// Signs a serializable claims set.
	pub async fn sign_claims<T>(&self, claims: &T, algorithm: Algorithm) -> Result<String>
	where
		T: ?Sized + Serialize,
	{
		let payload = serde_json::to_vec(claims).map_err(SigningError::Claims)?;

		self.sign_payload(&payload, algorithm).await
	}

	/// Signs a raw JSON payload verbatim, preserving its key order.
	pub async fn sign_json(&self, payload: &str, algorithm: Algorithm) -> Result<String> {
		self.sign_payload(payload.as_bytes(), algorithm).await
	}

	/// Verifies `token` against `key`, rejecting any algorithm other than `expected`
	/// before the signature is checked.
	pub fn verify<T>(
		&self,
		token: &str,
		expected: Algorithm,
		key: &DecodingKey,
	) -> Result<TokenData<T>>
	where
		T: DeserializeOwned,
	{
		let header = jsonwebtoken::decode_header(token).map_err(SigningError::Verify)?;

		if header.alg != expected {
			return Err(SigningError::AlgorithmMismatch { expected, found: header.alg }.into());
		}

		let mut validation = Validation::new(expected);

		validation.required_spec_claims.clear();
		validation.validate_aud = false;

		jsonwebtoken::decode(token, key, &validation).map_err(|e| SigningError::Verify(e).into())
	}

	/// Verifies an HS256 token issued with the internal secret.
	pub async fn verify_internal<T>(&self, token: &str) -> Result<TokenData<T>>
	where
		T: DeserializeOwned,
	{
		let secret = self.keys.internal(&self.config.internal_key).await?;

		self.verify(token, Algorithm::HS256, &secret.decoding)
	}

	async fn sign_payload(&self, payload: &[u8], algorithm: Algorithm) -> Result<String> {
		let (key, kid) = self.signing_key(algorithm).await?;
		let mut header = Header::new(algorithm);

		header.kid = kid;

		let header = serde_json::to_vec(&header).map_err(SigningError::Claims)?;
		let message =
			format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(payload));
		let signature = crypto::sign(message.as_bytes(), key, algorithm).map_err(|e| {
			// PEM framing parses eagerly; a bad key body only shows up at signing time.
			if matches!(e.kind(), JwtErrorKind::InvalidRsaKey(_)) {
				keys::key_load(KeyName::OpenBanking, e)
			} else {
				SigningError::Encode(e)
			}
		})?;

		Ok(format!("{message}.{signature}"))
	}

	async fn signing_key(&self, algorithm: Algorithm) -> Result<(&EncodingKey, Option<String>)> {
		match algorithm {
			Algorithm::RS256 => Ok((
				self.keys.open_banking(&self.config.open_banking_key).await?,
				Some(self.config.kid.clone()),
			)),
			// ring's RSA_PSS_SHA256 fixes the salt at the digest length.
			Algorithm::PS256 => match self.pss_salt_length {
				PssSaltLength::EqualsHash => Ok((
					self.keys.open_banking(&self.config.open_banking_key).await?,
					Some(self.config.kid.clone()),
				)),
			},
			Algorithm::HS256 =>
				Ok((&self.keys.internal(&self.config.internal_key).await?.encoding, None)),
			algorithm => Err(SigningError::UnsupportedAlgorithm { algorithm }.into()),
		}
	}
}
impl Debug for Signer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Signer")
			.field("kid", &self.config.kid)
			.field("pss_salt_length", &self.pss_salt_length)
			.field("open_banking_key_loaded", &self.is_key_loaded(KeyName::OpenBanking))
			.field("internal_key_loaded", &self.is_key_loaded(KeyName::Internal))
			.finish()
	}
}
