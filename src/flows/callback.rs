//! Bank redirect callback: exchanges the authorization code and authorises the consent.

// self
use crate::{
	_prelude::*,
	auth::{Cid, ConsentStatus, TrackingId},
	consent::authorised_token,
	flows::Broker,
	http::SecureHttpClient,
	obs::{self, FlowKind},
};

const KIND: FlowKind = FlowKind::Callback;

impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Completes the authorization started by [`Broker::create_consent`].
	///
	/// `state` is the tracking id echoed back by the bank. The consent must be
	/// awaiting authorisation; its placeholder token is superseded by the
	/// resource grant and the consent becomes `Authorised`. Returns the consent id
	/// under which the resource token is now cached.
	pub async fn process_callback(&self, code: &str, state: &TrackingId) -> Result<Cid> {
		obs::observe(KIND, "process_callback", async move {
			let consent = self
				.consents
				.find_by_tracking_id(state)
				.await?
				.filter(|consent| consent.status == ConsentStatus::AwaitingAuthorisation)
				.ok_or_else(|| Error::ConsentNotAwaitingAuthorisation {
					tracking_id: state.clone(),
				})?;
			let consent_expires_at = consent.expiration()?;
			let grant = self.tokens.resource_access_refresh_token(&consent.bank, code).await?;
			let issued_at = OffsetDateTime::now_utc();
			let expires_at = grant.expires_at(issued_at)?;
			let access_token = match consent.tokens.first() {
				Some(placeholder) => placeholder.access_token.clone(),
				None => {
					#[cfg(feature = "tracing")]
					tracing::warn!(cid = %consent.cid, "Consent has no placeholder token.");

					grant.access_token.clone()
				},
			};

			self.consents
				.authorise(&consent.cid, authorised_token(access_token, &grant, expires_at)?)
				.await?;
			self.cache_resource_token(
				KIND,
				&consent.cid,
				&grant.access_token,
				expires_at,
				consent_expires_at,
				issued_at,
			)
			.await;

			Ok(consent.cid)
		})
		.await
	}
}
