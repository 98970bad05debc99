//! Cache → consent → refresh-or-revoke resolution of a consent's resource token.
//!
//! [`Broker::authorised_resource_token`] is the one entry point account calls use to
//! obtain a bearer token. A cache hit returns immediately. Otherwise the caller
//! takes the consent's singleflight guard, re-checks the cache, and walks the
//! consent. Only consent-level expiry (or a consent left without any live token)
//! leads to revocation; a stale resource token is refreshed once and superseded in
//! the store.

// self
use crate::{
	_prelude::*,
	auth::{BankId, Cid, ConsentStatus, TokenSecret},
	consent::authorised_token,
	flows::{ACCOUNTS_SCOPE, Broker, common},
	http::SecureHttpClient,
	obs::{self, FlowKind},
};

const KIND: FlowKind = FlowKind::ResourceToken;

impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Returns a usable resource access token for the consent `cid` at `bank`.
	///
	/// Fails with [`Error::ConsentNotAuthorised`] when the consent is in another
	/// status or belongs to another bank, and with [`Error::ConsentExpired`] after
	/// revoking a consent that has passed its expiration or holds no live token.
	/// A stale token without a refresh token fails with
	/// [`Error::TokenNotRefreshable`] and leaves the consent `Authorised`.
	/// Refresh failures propagate unchanged and leave the stored rows untouched.
	pub async fn authorised_resource_token(&self, bank: &BankId, cid: &Cid) -> Result<TokenSecret> {
		obs::observe(KIND, "authorised_resource_token", async move {
			if let Some(token) = self.cached_resource_token(cid).await {
				return Ok(token);
			}

			let guard = common::flow_guard(self, cid);
			let _singleflight = guard.lock().await;

			if let Some(token) = self.cached_resource_token(cid).await {
				return Ok(token);
			}

			self.resolve_resource_token(bank, cid).await
		})
		.await
	}

	async fn cached_resource_token(&self, cid: &Cid) -> Option<TokenSecret> {
		let result = self.cache.get(cid.as_ref()).await;
		let token = self.swallow(KIND, "cache_get", result).flatten()?;

		self.metrics.record_cache_hit();

		Some(TokenSecret::new(token))
	}

	async fn resolve_resource_token(&self, bank: &BankId, cid: &Cid) -> Result<TokenSecret> {
		let consent = self
			.consents
			.find_by_cid(cid)
			.await?
			.ok_or_else(|| Error::ConsentNotFound { cid: cid.clone() })?;

		if consent.status != ConsentStatus::Authorised || consent.bank != *bank {
			return Err(Error::ConsentNotAuthorised { cid: cid.clone() });
		}

		let now = OffsetDateTime::now_utc();
		let consent_expires_at = consent.expiration()?;
		let consent_expired = consent_expires_at.is_some_and(|at| at <= now);
		let Some(token) = consent.live_token().filter(|_| !consent_expired) else {
			return Err(self.revoke_expired(cid).await);
		};

		if let Some((resource, expires_at)) = token.fresh_resource_token(now)? {
			self.cache_resource_token(KIND, cid, resource, expires_at, consent_expires_at, now).await;

			return Ok(resource.clone());
		}

		let Some(refresh_token) = token.resource_refresh_token.as_ref() else {
			return Err(Error::TokenNotRefreshable { cid: cid.clone() });
		};

		self.metrics.record_refresh_attempt();

		let refreshed = self
			.tokens
			.refresh_access_token(bank, ACCOUNTS_SCOPE, refresh_token.expose())
			.await
			.and_then(|grant| {
				let issued_at = OffsetDateTime::now_utc();
				let expires_at = grant.expires_at(issued_at)?;

				Ok((grant, issued_at, expires_at))
			})
			.inspect_err(|_| self.metrics.record_refresh_failure());
		let (grant, issued_at, expires_at) = refreshed?;
		let mut renewed = authorised_token(token.access_token.clone(), &grant, expires_at)?;

		// Banks that do not rotate refresh tokens omit them from the response.
		if renewed.resource_refresh_token.is_none() {
			renewed.resource_refresh_token = Some(refresh_token.clone());
		}

		self.consents.supersede_token(cid, renewed).await?;
		self.cache_resource_token(
			KIND,
			cid,
			&grant.access_token,
			expires_at,
			consent_expires_at,
			issued_at,
		)
		.await;

		Ok(grant.access_token)
	}

	async fn revoke_expired(&self, cid: &Cid) -> Error {
		let result = self.consents.revoke(cid).await;

		if self.swallow(KIND, "revoke_consent", result).is_some() {
			self.metrics.record_revocation();
		}

		Error::ConsentExpired { cid: cid.clone() }
	}
}
