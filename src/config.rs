//! Per-bank configuration lookup and signing-key settings.
//!
//! Banks are configured with a flat set of named string values (endpoint URLs,
//! client identifiers, the financial-institution id). The broker resolves every
//! value it needs before issuing any request, so a missing entry never leaves a
//! half-finished exchange behind.

pub mod file;

pub use file::FileConfig;

// std
use std::{env, path::PathBuf};
// self
use crate::{_prelude::*, auth::BankId, error::ConfigError};

/// Boxed future returned by [`ConfigProvider`] implementations.
pub type ConfigFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Resolves named per-bank settings.
pub trait ConfigProvider
where
	Self: Send + Sync,
{
	/// Returns the value configured for `name`, or [`ConfigError::NotFound`].
	fn find<'a>(&'a self, bank: &'a BankId, name: ConfigName) -> ConfigFuture<'a, String>;
}
impl dyn ConfigProvider + '_ {
	/// Resolves a value and parses it as an absolute URL.
	pub async fn find_url(&self, bank: &BankId, name: ConfigName) -> Result<Url> {
		let raw = self.find(bank, name).await?;

		Url::parse(&raw)
			.map_err(|source| ConfigError::InvalidUrl { bank: bank.clone(), name, source }.into())
	}
}

/// Configuration keys understood by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigName {
	/// Token endpoint.
	#[serde(rename = "endpoint.oauth2")]
	TokenEndpoint,
	/// Account information endpoint.
	#[serde(rename = "endpoint.accounts")]
	AccountsEndpoint,
	/// Account-access consent endpoint.
	#[serde(rename = "endpoint.account-access-consent")]
	ConsentEndpoint,
	/// OIDC authorization endpoint.
	#[serde(rename = "endpoint.authorize")]
	AuthorizeEndpoint,
	/// OAuth client identifier registered with the bank.
	#[serde(rename = "client.id")]
	ClientId,
	/// Redirect URI registered with the bank.
	#[serde(rename = "redirect.url")]
	RedirectUrl,
	/// Value of the `x-fapi-financial-id` header.
	#[serde(rename = "fapi.financial.id")]
	FinancialId,
	/// Request-object issuer.
	#[serde(rename = "iss")]
	Issuer,
	/// Request-object audience.
	#[serde(rename = "aud")]
	Audience,
}
impl ConfigName {
	/// Every recognised key.
	pub const ALL: [ConfigName; 9] = [
		ConfigName::TokenEndpoint,
		ConfigName::AccountsEndpoint,
		ConfigName::ConsentEndpoint,
		ConfigName::AuthorizeEndpoint,
		ConfigName::ClientId,
		ConfigName::RedirectUrl,
		ConfigName::FinancialId,
		ConfigName::Issuer,
		ConfigName::Audience,
	];

	/// Returns the dotted key used by configuration sources.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConfigName::TokenEndpoint => "endpoint.oauth2",
			ConfigName::AccountsEndpoint => "endpoint.accounts",
			ConfigName::ConsentEndpoint => "endpoint.account-access-consent",
			ConfigName::AuthorizeEndpoint => "endpoint.authorize",
			ConfigName::ClientId => "client.id",
			ConfigName::RedirectUrl => "redirect.url",
			ConfigName::FinancialId => "fapi.financial.id",
			ConfigName::Issuer => "iss",
			ConfigName::Audience => "aud",
		}
	}
}
impl Display for ConfigName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ConfigName {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|name| name.as_str() == s)
			.ok_or_else(|| format!("Unknown configuration key `{s}`."))
	}
}

pub(crate) type BankSettings = HashMap<BankId, HashMap<ConfigName, String>>;

pub(crate) fn lookup(settings: &BankSettings, bank: &BankId, name: ConfigName) -> Result<String> {
	settings
		.get(bank)
		.and_then(|values| values.get(&name))
		.cloned()
		.ok_or_else(|| ConfigError::NotFound { bank: bank.clone(), name }.into())
}

/// In-process configuration map for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryConfig(Arc<RwLock<BankSettings>>);
impl MemoryConfig {
	/// Adds or replaces a value, returning the updated config.
	pub fn with_value(self, bank: &BankId, name: ConfigName, value: impl Into<String>) -> Self {
		self.set(bank, name, value);

		self
	}

	/// Adds or replaces a value in place.
	pub fn set(&self, bank: &BankId, name: ConfigName, value: impl Into<String>) {
		self.0.write().entry(bank.clone()).or_default().insert(name, value.into());
	}

	/// Removes a value, returning the previous one.
	pub fn remove(&self, bank: &BankId, name: ConfigName) -> Option<String> {
		self.0.write().get_mut(bank).and_then(|values| values.remove(&name))
	}
}
impl ConfigProvider for MemoryConfig {
	fn find<'a>(&'a self, bank: &'a BankId, name: ConfigName) -> ConfigFuture<'a, String> {
		Box::pin(async move { lookup(&self.0.read(), bank, name) })
	}
}

/// Locations and identifiers for signing keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningConfig {
	/// PEM-encoded RSA private key used for bank-facing JWTs.
	pub open_banking_key: PathBuf,
	/// Symmetric secret used for internal service tokens.
	pub internal_key: PathBuf,
	/// Key identifier placed in the header of RSA-signed JWTs.
	pub kid: String,
}
impl SigningConfig {
	/// Environment variable holding the bank-facing private key path.
	pub const OPEN_BANKING_KEY_ENV: &'static str = "OB_SIGN_KEY";
	/// Environment variable holding the internal secret path.
	pub const INTERNAL_KEY_ENV: &'static str = "INTERNAL_SIGN_KEY";
	/// Environment variable holding the key identifier.
	pub const KID_ENV: &'static str = "KID";

	/// Builds a config from explicit values.
	pub fn new(
		open_banking_key: impl Into<PathBuf>,
		internal_key: impl Into<PathBuf>,
		kid: impl Into<String>,
	) -> Self {
		Self {
			open_banking_key: open_banking_key.into(),
			internal_key: internal_key.into(),
			kid: kid.into(),
		}
	}

	/// Reads `OB_SIGN_KEY`, `INTERNAL_SIGN_KEY`, and `KID` from the environment.
	pub fn from_env() -> Result<Self> {
		let read = |name: &'static str| env::var(name).map_err(|_| ConfigError::MissingEnv { name });

		Ok(Self::new(
			read(Self::OPEN_BANKING_KEY_ENV)?,
			read(Self::INTERNAL_KEY_ENV)?,
			read(Self::KID_ENV)?,
		))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn bank() -> BankId {
		BankId::new("bank-a").expect("Bank fixture should be valid.")
	}

	#[test]
	fn names_round_trip_through_wire_labels() {
		for name in ConfigName::ALL {
			assert_eq!(name.as_str().parse::<ConfigName>(), Ok(name));
			assert_eq!(
				serde_json::to_string(&name).expect("Config names should serialize."),
				format!("\"{}\"", name.as_str())
			);
		}

		assert!("endpoint.unknown".parse::<ConfigName>().is_err());
	}

	#[tokio::test]
	async fn memory_config_reports_missing_keys() {
		let bank = bank();
		let config = MemoryConfig::default().with_value(&bank, ConfigName::ClientId, "client-1");
		let provider: &dyn ConfigProvider = &config;

		assert_eq!(
			provider.find(&bank, ConfigName::ClientId).await.expect("Client id should resolve."),
			"client-1"
		);

		let err = provider
			.find(&bank, ConfigName::RedirectUrl)
			.await
			.expect_err("Missing keys should surface as errors.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::NotFound { name: ConfigName::RedirectUrl, .. })
		));
	}

	#[tokio::test]
	async fn find_url_rejects_relative_values() {
		let bank = bank();
		let config =
			MemoryConfig::default().with_value(&bank, ConfigName::TokenEndpoint, "/token");
		let provider: &dyn ConfigProvider = &config;
		let err = provider
			.find_url(&bank, ConfigName::TokenEndpoint)
			.await
			.expect_err("Relative URLs should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidUrl { .. })));
	}
}
