//! Open Banking credential broker: consent lifecycle, resource-token refresh, request-object
//! signing, and pluggable credential caches in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod consent;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod signing;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::path::PathBuf;
	// self
	use crate::{
		auth::{
			BankId, Cid, Consent, ConsentStatus, SessionRef, Token, TokenId, TokenSecret,
			TokenStatus, TrackingId, format_timestamp,
		},
		cache::{CredentialCache, MemoryCache},
		config::{ConfigName, ConfigProvider, MemoryConfig, SigningConfig},
		flows::Broker,
		http::ReqwestHttpClient,
		signing::Signer,
		store::{ConsentStore, MemoryConsentStore},
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = Broker<ReqwestHttpClient>;

	/// Client id configured for the mock bank.
	pub const TEST_CLIENT_ID: &str = "client-123";
	/// Financial institution id configured for the mock bank.
	pub const TEST_FINANCIAL_ID: &str = "0015800001041REAAY";
	/// Redirect URI configured for the mock bank.
	pub const TEST_REDIRECT_URL: &str = "https://tpp.example/callback";
	/// Audience configured for the mock bank.
	pub const TEST_AUDIENCE: &str = "https://bank.example";
	/// Key id stamped on request objects signed in tests.
	pub const TEST_KID: &str = "test-kid";

	/// Broker wired to a mock bank, plus handles on its in-memory collaborators.
	#[derive(Debug)]
	pub struct TestBank {
		/// Broker under test.
		pub broker: ReqwestTestBroker,
		/// Consent store shared with the broker.
		pub store: MemoryConsentStore,
		/// Bank settings shared with the broker.
		pub config: MemoryConfig,
		/// Bank the settings are registered under.
		pub bank: BankId,
	}
	impl TestBank {
		/// Seeds an authorised consent with one live token expiring at `token_expires_at`.
		pub fn seed_authorised_consent(
			&self,
			cid: &str,
			consent_expires_at: Option<OffsetDateTime>,
			token_expires_at: OffsetDateTime,
		) -> Consent {
			let cid = Cid::new(cid).expect("Test consent identifier should be valid.");
			let stamp = |at| format_timestamp(at).expect("Test timestamps should format.");
			let now = stamp(OffsetDateTime::now_utc());
			let token = Token {
				id: TokenId::new(format!("{cid}-token")).expect("Test token id should be valid."),
				cid: cid.clone(),
				access_token: TokenSecret::new("cc-token"),
				resource_access_token: Some(TokenSecret::new("resource-old")),
				resource_refresh_token: Some(TokenSecret::new("refresh-old")),
				status: TokenStatus::Authorised,
				expires_in: 3600,
				expires_at: Some(stamp(token_expires_at)),
				created_at: now.clone(),
				updated_at: now.clone(),
			};
			let consent = Consent {
				cid: cid.clone(),
				tracking_id: TrackingId::new(format!("{cid}-tracking"))
					.expect("Test tracking id should be valid."),
				session_ref: SessionRef::new("session-1").expect("Test session should be valid."),
				bank: self.bank.clone(),
				consent_id: format!("intent-{cid}"),
				status: ConsentStatus::Authorised,
				expires_at: consent_expires_at.map(stamp),
				transaction_from: None,
				transaction_to: None,
				created_at: now.clone(),
				updated_at: now,
				tokens: vec![token],
			};

			self.store.insert(consent.clone());

			consent
		}
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Path of a file under `tests/fixtures`.
	pub fn fixture_path(name: &str) -> PathBuf {
		PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
	}

	/// Signer backed by the RSA and HMAC fixtures.
	pub fn test_signer() -> Signer {
		Signer::new(SigningConfig::new(
			fixture_path("ob_sign_key.pem"),
			fixture_path("internal_sign_key.secret"),
			TEST_KID,
		))
	}

	/// Bank settings pointing every endpoint at `base_url`.
	pub fn test_bank_config(bank: &BankId, base_url: &str) -> MemoryConfig {
		let base_url = base_url.trim_end_matches('/');

		MemoryConfig::default()
			.with_value(bank, ConfigName::TokenEndpoint, format!("{base_url}/token"))
			.with_value(bank, ConfigName::AccountsEndpoint, format!("{base_url}/accounts"))
			.with_value(
				bank,
				ConfigName::ConsentEndpoint,
				format!("{base_url}/account-access-consents"),
			)
			.with_value(bank, ConfigName::AuthorizeEndpoint, format!("{base_url}/authorize"))
			.with_value(bank, ConfigName::ClientId, TEST_CLIENT_ID)
			.with_value(bank, ConfigName::RedirectUrl, TEST_REDIRECT_URL)
			.with_value(bank, ConfigName::FinancialId, TEST_FINANCIAL_ID)
			.with_value(bank, ConfigName::Issuer, TEST_CLIENT_ID)
			.with_value(bank, ConfigName::Audience, TEST_AUDIENCE)
	}

	/// Constructs a [`Broker`] backed by in-memory collaborators and the reqwest transport
	/// used across integration tests; returns the cache the broker writes to.
	pub fn build_reqwest_test_broker(base_url: &str) -> (TestBank, MemoryCache) {
		let cache = MemoryCache::default();
		let bank = build_reqwest_test_broker_with_cache(base_url, Arc::new(cache.clone()));

		(bank, cache)
	}

	/// Like [`build_reqwest_test_broker`], with a caller-supplied cache backend.
	pub fn build_reqwest_test_broker_with_cache(
		base_url: &str,
		cache: Arc<dyn CredentialCache>,
	) -> TestBank {
		let bank = BankId::new("bank-a").expect("Test bank identifier should be valid.");
		let config = test_bank_config(&bank, base_url);
		let store = MemoryConsentStore::default();
		let config_provider: Arc<dyn ConfigProvider> = Arc::new(config.clone());
		let consent_store: Arc<dyn ConsentStore> = Arc::new(store.clone());
		let broker = Broker::with_http_client(
			config_provider,
			consent_store,
			cache,
			test_signer(),
			test_reqwest_http_client(),
		);

		TestBank { broker, store, config, bank }
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
