//! Consent lifecycle: lookups, state transitions, and token supersession.
//!
//! State machine for [`ConsentStatus`]:
//!
//! - `AwaitingAuthorisation` → `Authorised` once the bank callback's code exchange succeeds.
//! - `Authorised` → `Revoked` when the consent's own expiration has passed or no live token
//!   remains.
//!
//! Tokens move to `Expired` individually; a consent is never expired automatically.

// self
use crate::{
	_prelude::*,
	auth::{
		ActiveConsent, Cid, Consent, ConsentStatus, NewConsent, NewToken, Token, TokenSecret,
		TokenStatus, TppId, TrackingId, UserId, format_timestamp,
	},
	oauth::AccessTokenGrant,
	store::ConsentStore,
};

/// Owns consent and token persistence on behalf of the broker.
#[derive(Clone)]
pub struct ConsentManager {
	store: Arc<dyn ConsentStore>,
}
impl ConsentManager {
	/// Wraps a consent store.
	pub fn new(store: Arc<dyn ConsentStore>) -> Self {
		Self { store }
	}

	/// Loads a consent by internal id.
	pub async fn find_by_cid(&self, cid: &Cid) -> Result<Option<Consent>> {
		Ok(self.store.find_by_cid(cid).await?)
	}

	/// Loads a consent by its creation tracking id.
	pub async fn find_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Consent>> {
		Ok(self.store.find_by_tracking_id(tracking_id).await?)
	}

	/// Loads a consent by internal id when it is in `status`.
	pub async fn find_by_cid_and_status(
		&self,
		cid: &Cid,
		status: ConsentStatus,
	) -> Result<Option<Consent>> {
		Ok(self.store.find_by_cid_and_status(cid, status).await?)
	}

	/// Authorised consents for `(user, tpp)` whose expiration is still ahead.
	///
	/// Expiry is evaluated here at call time; a malformed stored timestamp fails the
	/// whole query.
	pub async fn find_active_consents(
		&self,
		user: &UserId,
		tpp: &TppId,
	) -> Result<Vec<ActiveConsent>> {
		let now = OffsetDateTime::now_utc();
		let mut active = Vec::new();

		let consents = self.store.find_by_user_and_tpp(user, tpp, ConsentStatus::Authorised).await?;

		for consent in consents {
			if !consent.is_expired_at(now)? {
				active.push(ActiveConsent { cid: consent.cid, bank: consent.bank });
			}
		}

		Ok(active)
	}

	/// Rejects a tracking id that already maps to a consent.
	pub async fn ensure_tracking_id_unused(&self, tracking_id: &TrackingId) -> Result<()> {
		match self.store.find_by_tracking_id(tracking_id).await? {
			Some(_) => Err(Error::TrackingIdInUse { tracking_id: tracking_id.clone() }),
			None => Ok(()),
		}
	}

	/// Persists a new consent with its first token row.
	pub async fn create(&self, consent: NewConsent) -> Result<Consent> {
		Ok(self.store.save_consent(consent).await?)
	}

	/// Appends a token row, marking every prior row `Expired`.
	pub async fn supersede_token(&self, cid: &Cid, token: NewToken) -> Result<Token> {
		Ok(self.store.supersede_token(cid, token).await?)
	}

	/// Sets the status of every token row of the consent.
	pub async fn invalidate_tokens(&self, cid: &Cid, status: TokenStatus) -> Result<usize> {
		Ok(self.store.mark_tokens(cid, status).await?)
	}

	/// Changes the consent's status.
	pub async fn change_status(&self, cid: &Cid, status: ConsentStatus) -> Result<()> {
		Ok(self.store.change_consent_status(cid, status).await?)
	}

	/// Marks the consent `Revoked`.
	pub async fn revoke(&self, cid: &Cid) -> Result<()> {
		self.change_status(cid, ConsentStatus::Revoked).await
	}

	/// Stores the authorised token row and moves the consent to `Authorised`.
	pub async fn authorise(&self, cid: &Cid, token: NewToken) -> Result<Token> {
		let token = self.supersede_token(cid, token).await?;

		self.change_status(cid, ConsentStatus::Authorised).await?;

		Ok(token)
	}
}
impl Debug for ConsentManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ConsentManager(..)")
	}
}

/// Builds an authorised token row from a resource grant expiring at `expires_at`.
///
/// `expires_at` comes from [`AccessTokenGrant::expires_at`], so the margin is already applied.
pub fn authorised_token(
	access_token: TokenSecret,
	grant: &AccessTokenGrant,
	expires_at: OffsetDateTime,
) -> Result<NewToken> {
	Ok(NewToken {
		access_token,
		resource_access_token: Some(grant.access_token.clone()),
		resource_refresh_token: grant.refresh_token.clone(),
		status: TokenStatus::Authorised,
		expires_in: grant.expires_in.unwrap_or_default(),
		expires_at: Some(format_timestamp(expires_at)?),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{BankId, SessionRef, parse_timestamp},
		oauth::GrantType,
		store::MemoryConsentStore,
	};

	fn new_consent(tracking: &str, session: &str, expires_at: Option<String>) -> NewConsent {
		NewConsent {
			tracking_id: TrackingId::new(tracking).expect("Tracking fixture should be valid."),
			session_ref: SessionRef::new(session).expect("Session fixture should be valid."),
			bank: BankId::new("bank-a").expect("Bank fixture should be valid."),
			consent_id: format!("intent-{tracking}"),
			status: ConsentStatus::AwaitingAuthorisation,
			expires_at,
			transaction_from: None,
			transaction_to: None,
			token: NewToken::placeholder("cc-token"),
		}
	}

	fn grant(expires_in: i64) -> AccessTokenGrant {
		AccessTokenGrant {
			grant_type: GrantType::AuthorizationCode,
			access_token: TokenSecret::new("resource-1"),
			refresh_token: Some(TokenSecret::new("refresh-1")),
			expires_in: Some(expires_in),
			scope: None,
		}
	}

	fn stamp(at: OffsetDateTime) -> String {
		format_timestamp(at).expect("Test timestamps should format.")
	}

	fn manager() -> (ConsentManager, MemoryConsentStore) {
		let store = MemoryConsentStore::default();

		(ConsentManager::new(Arc::new(store.clone())), store)
	}

	#[tokio::test]
	async fn tracking_ids_are_guarded() {
		let (manager, _) = manager();
		let consent = manager
			.create(new_consent("track-1", "session-1", None))
			.await
			.expect("First creation should succeed.");
		let err = manager
			.ensure_tracking_id_unused(&consent.tracking_id)
			.await
			.expect_err("Reused tracking ids must be rejected.");

		assert!(matches!(err, Error::TrackingIdInUse { .. }));
		assert!(
			manager.create(new_consent("track-1", "session-1", None)).await.is_err(),
			"The store should also refuse duplicates."
		);
	}

	#[tokio::test]
	async fn authorise_supersedes_placeholder() {
		let (manager, store) = manager();
		let consent = manager
			.create(new_consent("track-2", "session-1", None))
			.await
			.expect("Creation should succeed.");
		let issued_at = OffsetDateTime::now_utc();
		let grant = grant(3600);
		let expires_at = grant.expires_at(issued_at).expect("In-range lifetimes should convert.");
		let row = authorised_token(consent.tokens[0].access_token.clone(), &grant, expires_at)
			.expect("Authorised row should build.");
		let token =
			manager.authorise(&consent.cid, row).await.expect("Authorisation should succeed.");
		let stored = store.get(&consent.cid).expect("Consent should exist.");

		assert_eq!(stored.status, ConsentStatus::Authorised);
		assert_eq!(stored.tokens.len(), 2);
		assert_eq!(stored.tokens[0].id, token.id);
		assert_eq!(stored.tokens[1].status, TokenStatus::Expired);

		let expires_at = parse_timestamp(
			"token expiration",
			token.expires_at.as_deref().expect("Authorised rows carry an expiration."),
		)
		.expect("Stored expiration should parse.");
		let expected = issued_at + Duration::seconds(3300);

		assert!((expires_at - expected).whole_seconds().abs() <= 1);
		assert!(
			manager
				.find_by_cid_and_status(&consent.cid, ConsentStatus::Authorised)
				.await
				.expect("Lookup should succeed.")
				.is_some()
		);
	}

	#[tokio::test]
	async fn invalidate_tokens_marks_every_row() {
		let (manager, store) = manager();
		let consent = manager
			.create(new_consent("track-4", "session-1", None))
			.await
			.expect("Creation should succeed.");
		let grant = grant(3600);
		let expires_at = grant
			.expires_at(OffsetDateTime::now_utc())
			.expect("In-range lifetimes should convert.");
		let row = authorised_token(consent.tokens[0].access_token.clone(), &grant, expires_at)
			.expect("Authorised row should build.");

		manager.authorise(&consent.cid, row).await.expect("Authorisation should succeed.");

		let marked = manager
			.invalidate_tokens(&consent.cid, TokenStatus::Expired)
			.await
			.expect("Invalidation should succeed.");
		let stored = store.get(&consent.cid).expect("Consent should exist.");

		assert_eq!(marked, 2);
		assert!(stored.tokens.iter().all(|token| token.status == TokenStatus::Expired));
		assert!(stored.live_token().is_none(), "No row should remain live.");
		assert_eq!(stored.status, ConsentStatus::Authorised, "Consent status is untouched.");

		let missing = Cid::new("cid-missing").expect("Consent identifier should be valid.");

		assert!(matches!(
			manager.invalidate_tokens(&missing, TokenStatus::Expired).await,
			Err(Error::Storage(_))
		));
	}

	#[tokio::test]
	async fn active_consents_filter_expired_rows() {
		let (manager, store) = manager();
		let user = UserId::new("user-1").expect("User fixture should be valid.");
		let tpp = TppId::new("tpp-1").expect("Tpp fixture should be valid.");
		let now = OffsetDateTime::now_utc();

		store.bind_session(
			SessionRef::new("session-1").expect("Session fixture should be valid."),
			user.clone(),
			tpp.clone(),
		);

		let live = manager
			.create(new_consent(
				"track-live",
				"session-1",
				Some(stamp(now + Duration::days(30))),
			))
			.await
			.expect("Creation should succeed.");
		let stale = manager
			.create(new_consent(
				"track-stale",
				"session-1",
				Some(stamp(now - Duration::days(1))),
			))
			.await
			.expect("Creation should succeed.");
		let other = manager
			.create(new_consent("track-other", "session-2", None))
			.await
			.expect("Creation should succeed.");

		for cid in [&live.cid, &stale.cid, &other.cid] {
			manager
				.change_status(cid, ConsentStatus::Authorised)
				.await
				.expect("Status change should succeed.");
		}

		let active =
			manager.find_active_consents(&user, &tpp).await.expect("Active query should succeed.");

		assert_eq!(active, vec![ActiveConsent { cid: live.cid.clone(), bank: live.bank.clone() }]);
	}

	#[tokio::test]
	async fn malformed_expiration_fails_active_query() {
		let (manager, store) = manager();
		let user = UserId::new("user-2").expect("User fixture should be valid.");
		let tpp = TppId::new("tpp-2").expect("Tpp fixture should be valid.");

		store.bind_session(
			SessionRef::new("session-9").expect("Session fixture should be valid."),
			user.clone(),
			tpp.clone(),
		);

		let consent = manager
			.create(new_consent("track-bad", "session-9", Some("next week".into())))
			.await
			.expect("Creation should succeed.");

		manager
			.change_status(&consent.cid, ConsentStatus::Authorised)
			.await
			.expect("Status change should succeed.");

		let err = manager
			.find_active_consents(&user, &tpp)
			.await
			.expect_err("Malformed expirations must not be defaulted.");

		assert!(matches!(err, Error::MalformedTimestamp { .. }));
	}

	#[tokio::test]
	async fn writes_to_missing_consents_fail() {
		let (manager, _) = manager();
		let cid = Cid::new("cid-missing").expect("Consent fixture should be valid.");
		let err = manager.revoke(&cid).await.expect_err("Unknown consents cannot be revoked.");

		assert!(matches!(err, Error::Storage(crate::store::StoreError::NotFound { .. })));
		assert!(manager.find_by_cid(&cid).await.expect("Lookups should succeed.").is_none());
	}
}
