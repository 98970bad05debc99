//! Shared helpers for flow implementations (guards, cache writes, API requests).

// crates.io
use async_lock::MutexGuard;
use oauth2::http::{Method, header};
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{BankId, Cid, TokenSecret},
	cache::CacheTtl,
	config::ConfigName,
	error::ConfigError,
	flows::{Broker, FlowGuards},
	http::{FAPI_FINANCIAL_ID, HttpRequest, IDEMPOTENCY_KEY, SecureHttpClient},
	obs::{self, FlowKind},
};

impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Logs and counts a failed best-effort step, returning the value on success.
	pub(crate) fn swallow<T, E>(
		&self,
		kind: FlowKind,
		stage: &'static str,
		result: Result<T, E>,
	) -> Option<T>
	where
		E: Display,
	{
		let value = obs::best_effort(kind, stage, result);

		if value.is_none() {
			self.metrics.record_swallowed_failure();
		}

		value
	}

	/// Caches `token` under `cid` until the earlier of its own and its consent's expiration.
	pub(crate) async fn cache_resource_token(
		&self,
		kind: FlowKind,
		cid: &Cid,
		token: &TokenSecret,
		token_expires_at: OffsetDateTime,
		consent_expires_at: Option<OffsetDateTime>,
		now: OffsetDateTime,
	) {
		let Some(ttl) = cache_ttl(token_expires_at, consent_expires_at, now) else {
			return;
		};
		let result = self.cache.set(cid.as_ref(), token.expose(), ttl).await;

		self.swallow(kind, "cache_set", result);
	}
}

/// Lease on a consent's singleflight lock.
///
/// The map entry is removed when the last lease for the consent is dropped, so
/// the guard map only holds consents that are being resolved right now.
pub(crate) struct FlowGuard {
	guards: FlowGuards,
	cid: Cid,
	lock: Arc<AsyncMutex<()>>,
}
impl FlowGuard {
	pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
		self.lock.lock().await
	}
}
impl Drop for FlowGuard {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// Leases are only cloned under the map lock: two references means the map and us.
		if Arc::strong_count(&self.lock) == 2
			&& guards.get(&self.cid).is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
		{
			guards.remove(&self.cid);
		}
	}
}

/// Returns (and creates on demand) the singleflight guard for a consent id.
pub(crate) fn flow_guard<C>(broker: &Broker<C>, cid: &Cid) -> FlowGuard
where
	C: ?Sized + SecureHttpClient,
{
	let lock = broker
		.flow_guards
		.lock()
		.entry(cid.clone())
		.or_insert_with(|| Arc::new(AsyncMutex::new(())))
		.clone();

	FlowGuard { guards: broker.flow_guards.clone(), cid: cid.clone(), lock }
}

/// TTL for a cached resource token; `None` when less than one second remains.
pub(crate) fn cache_ttl(
	token_expires_at: OffsetDateTime,
	consent_expires_at: Option<OffsetDateTime>,
	now: OffsetDateTime,
) -> Option<CacheTtl> {
	let until = match consent_expires_at {
		Some(consent) => token_expires_at.min(consent),
		None => token_expires_at,
	};
	let seconds = (until - now).whole_seconds();

	(seconds >= 1).then(|| CacheTtl::After(Duration::seconds(seconds)))
}

/// Builds a bank API request carrying the bearer token and the FAPI header set.
pub(crate) fn api_request(
	method: Method,
	url: &Url,
	bearer: &TokenSecret,
	financial_id: &str,
	body: Vec<u8>,
) -> Result<HttpRequest> {
	let authorization = bearer.bearer();
	let idempotency_key = Uuid::new_v4().to_string();

	crate::http::build_request(
		method,
		url,
		&[
			(header::AUTHORIZATION.as_str(), authorization.as_str()),
			(header::ACCEPT.as_str(), "application/json"),
			(header::CONTENT_TYPE.as_str(), "application/json"),
			(header::CACHE_CONTROL.as_str(), "no-cache"),
			(FAPI_FINANCIAL_ID, financial_id),
			(IDEMPOTENCY_KEY, idempotency_key.as_str()),
		],
		body,
	)
}

/// Appends one escaped path segment to a configured endpoint.
pub(crate) fn join_segment(
	bank: &BankId,
	name: ConfigName,
	base: &Url,
	segment: &str,
) -> Result<Url> {
	let mut joined = base.clone();

	joined
		.path_segments_mut()
		.map_err(|_| ConfigError::InvalidUrl {
			bank: bank.clone(),
			name,
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		})?
		.pop_if_empty()
		.push(segment);

	Ok(joined)
}
