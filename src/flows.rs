//! High-level broker flows: resource tokens, consent authorization, callbacks, and account calls.

pub mod consent;
pub mod metrics;

mod accounts;
mod callback;
mod common;
mod resource_token;

pub use consent::*;
pub use metrics::BrokerMetrics;

// self
use crate::{
	_prelude::*,
	auth::Cid,
	cache::CredentialCache,
	config::ConfigProvider,
	consent::ConsentManager,
	http::SecureHttpClient,
	oauth::TokenService,
	signing::Signer,
	store::ConsentStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Scope requested for every account-information grant.
pub const ACCOUNTS_SCOPE: &str = "accounts";

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestHttpClient>;

type FlowGuards = Arc<Mutex<HashMap<Cid, Arc<AsyncMutex<()>>>>>;

/// Coordinates consent, token, cache, and signing state for every configured bank.
///
/// The broker owns shared handles only, so cloning it is cheap and every clone
/// observes the same cache, store, and singleflight guards. Refreshes are
/// serialized per consent id; different consents proceed in parallel.
#[derive(Clone)]
pub struct Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// HTTP client used for every outbound bank request.
	pub http_client: Arc<C>,
	/// Per-bank settings.
	pub config: Arc<dyn ConfigProvider>,
	/// OAuth2 grant executor sharing the broker's transport and configuration.
	pub tokens: TokenService<C>,
	/// Consent and token persistence.
	pub consents: ConsentManager,
	/// Resource-token cache keyed by consent id.
	pub cache: Arc<dyn CredentialCache>,
	/// Request-object signer.
	pub signer: Signer,
	/// Shared counters for cache, refresh, and revocation outcomes.
	pub metrics: Arc<BrokerMetrics>,
	flow_guards: FlowGuards,
}
impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(
		config: Arc<dyn ConfigProvider>,
		store: Arc<dyn ConsentStore>,
		cache: Arc<dyn CredentialCache>,
		signer: Signer,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		let http_client = http_client.into();

		Self {
			tokens: TokenService::new(config.clone(), http_client.clone()),
			http_client,
			config,
			consents: ConsentManager::new(store),
			cache,
			signer,
			metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the metrics sink, e.g. to share counters between brokers.
	pub fn with_metrics(mut self, metrics: Arc<BrokerMetrics>) -> Self {
		self.metrics = metrics;

		self
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient> {
	/// Creates a broker with its own reqwest transport (30 second timeout, no redirects).
	pub fn new(
		config: Arc<dyn ConfigProvider>,
		store: Arc<dyn ConsentStore>,
		cache: Arc<dyn CredentialCache>,
		signer: Signer,
	) -> Result<Self> {
		Ok(Self::with_http_client(config, store, cache, signer, ReqwestHttpClient::new()?))
	}
}
impl<C> Debug for Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("consents", &self.consents)
			.field("signer", &self.signer)
			.field("metrics", &self.metrics)
			.finish()
	}
}
