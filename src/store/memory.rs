//! Thread-safe in-memory [`ConsentStore`] for local development and tests.

// crates.io
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::{
		Cid, Consent, ConsentStatus, NewConsent, NewToken, SessionRef, Token, TokenId, TokenStatus,
		TppId, TrackingId, UserId, format_timestamp,
	},
	store::{ConsentStore, StoreError, StoreFuture},
};

#[derive(Debug, Default)]
struct State {
	consents: HashMap<Cid, Consent>,
	tracking: HashMap<TrackingId, Cid>,
	sessions: HashMap<SessionRef, (UserId, TppId)>,
	next_token: u64,
}
impl State {
	fn consent_mut(&mut self, cid: &Cid) -> Result<&mut Consent, StoreError> {
		self.consents.get_mut(cid).ok_or_else(|| StoreError::NotFound { cid: cid.to_string() })
	}

	fn new_token(&mut self, cid: &Cid, token: NewToken, now: &str) -> Result<Token, StoreError> {
		self.next_token += 1;

		let id = TokenId::new(format!("tok-{}", self.next_token))
			.map_err(|e| StoreError::Backend { message: e.to_string() })?;

		Ok(Token {
			id,
			cid: cid.clone(),
			access_token: token.access_token,
			resource_access_token: token.resource_access_token,
			resource_refresh_token: token.resource_refresh_token,
			status: token.status,
			expires_in: token.expires_in,
			expires_at: token.expires_at,
			created_at: now.to_owned(),
			updated_at: now.to_owned(),
		})
	}
}

type StoreState = Arc<RwLock<State>>;

fn stamp_now() -> Result<String, StoreError> {
	format_timestamp(OffsetDateTime::now_utc())
		.map_err(|e| StoreError::Backend { message: e.to_string() })
}

/// Thread-safe storage backend that keeps consents in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryConsentStore(StoreState);
impl MemoryConsentStore {
	/// Associates a session with the user and third party it acts for.
	pub fn bind_session(&self, session: SessionRef, user: UserId, tpp: TppId) {
		self.0.write().sessions.insert(session, (user, tpp));
	}

	/// Inserts a fully formed consent, replacing any consent with the same cid.
	pub fn insert(&self, consent: Consent) {
		let mut state = self.0.write();

		state.tracking.insert(consent.tracking_id.clone(), consent.cid.clone());
		state.consents.insert(consent.cid.clone(), consent);
	}

	/// Snapshot of a consent, including superseded token rows.
	pub fn get(&self, cid: &Cid) -> Option<Consent> {
		self.0.read().consents.get(cid).cloned()
	}

	fn save_consent_now(state: StoreState, consent: NewConsent) -> Result<Consent, StoreError> {
		let mut state = state.write();

		if state.tracking.contains_key(&consent.tracking_id) {
			return Err(StoreError::Conflict {
				message: format!("tracking id `{}` is already in use", consent.tracking_id),
			});
		}

		let cid = Cid::new(Uuid::new_v4().to_string())
			.map_err(|e| StoreError::Backend { message: e.to_string() })?;
		let now = stamp_now()?;
		let token = state.new_token(&cid, consent.token, &now)?;
		let record = Consent {
			cid: cid.clone(),
			tracking_id: consent.tracking_id,
			session_ref: consent.session_ref,
			bank: consent.bank,
			consent_id: consent.consent_id,
			status: consent.status,
			expires_at: consent.expires_at,
			transaction_from: consent.transaction_from,
			transaction_to: consent.transaction_to,
			created_at: now.clone(),
			updated_at: now,
			tokens: vec![token],
		};

		state.tracking.insert(record.tracking_id.clone(), cid.clone());
		state.consents.insert(cid, record.clone());

		Ok(record)
	}

	fn supersede_now(state: StoreState, cid: &Cid, token: NewToken) -> Result<Token, StoreError> {
		let now = stamp_now()?;
		let mut state = state.write();

		state.consent_mut(cid)?;

		let token = state.new_token(cid, token, &now)?;
		let consent = state.consent_mut(cid)?;

		for existing in &mut consent.tokens {
			if existing.status != TokenStatus::Expired {
				existing.status = TokenStatus::Expired;
				existing.updated_at = now.clone();
			}
		}

		consent.tokens.insert(0, token.clone());
		consent.updated_at = now;

		Ok(token)
	}

	fn mark_now(state: StoreState, cid: &Cid, status: TokenStatus) -> Result<usize, StoreError> {
		let now = stamp_now()?;
		let mut state = state.write();
		let consent = state.consent_mut(cid)?;

		for token in &mut consent.tokens {
			token.status = status;
			token.updated_at = now.clone();
		}

		Ok(consent.tokens.len())
	}

	fn change_status_now(
		state: StoreState,
		cid: &Cid,
		status: ConsentStatus,
	) -> Result<(), StoreError> {
		let now = stamp_now()?;
		let mut state = state.write();
		let consent = state.consent_mut(cid)?;

		consent.status = status;
		consent.updated_at = now;

		Ok(())
	}
}
impl ConsentStore for MemoryConsentStore {
	fn find_by_cid<'a>(&'a self, cid: &'a Cid) -> StoreFuture<'a, Option<Consent>> {
		Box::pin(async move { Ok(self.get(cid)) })
	}

	fn find_by_tracking_id<'a>(
		&'a self,
		tracking_id: &'a TrackingId,
	) -> StoreFuture<'a, Option<Consent>> {
		Box::pin(async move {
			let state = self.0.read();

			Ok(state.tracking.get(tracking_id).and_then(|cid| state.consents.get(cid)).cloned())
		})
	}

	fn find_by_cid_and_status<'a>(
		&'a self,
		cid: &'a Cid,
		status: ConsentStatus,
	) -> StoreFuture<'a, Option<Consent>> {
		Box::pin(async move { Ok(self.get(cid).filter(|consent| consent.status == status)) })
	}

	fn find_by_user_and_tpp<'a>(
		&'a self,
		user: &'a UserId,
		tpp: &'a TppId,
		status: ConsentStatus,
	) -> StoreFuture<'a, Vec<Consent>> {
		Box::pin(async move {
			let state = self.0.read();
			let mut consents = state
				.consents
				.values()
				.filter(|consent| consent.status == status)
				.filter(|consent| {
					state
						.sessions
						.get(&consent.session_ref)
						.is_some_and(|(u, t)| u == user && t == tpp)
				})
				.cloned()
				.collect::<Vec<_>>();

			consents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.cid.cmp(&b.cid)));

			Ok(consents)
		})
	}

	fn save_consent(&self, consent: NewConsent) -> StoreFuture<'_, Consent> {
		let state = self.0.clone();

		Box::pin(async move { Self::save_consent_now(state, consent) })
	}

	fn supersede_token<'a>(&'a self, cid: &'a Cid, token: NewToken) -> StoreFuture<'a, Token> {
		let state = self.0.clone();

		Box::pin(async move { Self::supersede_now(state, cid, token) })
	}

	fn mark_tokens<'a>(&'a self, cid: &'a Cid, status: TokenStatus) -> StoreFuture<'a, usize> {
		let state = self.0.clone();

		Box::pin(async move { Self::mark_now(state, cid, status) })
	}

	fn change_consent_status<'a>(
		&'a self,
		cid: &'a Cid,
		status: ConsentStatus,
	) -> StoreFuture<'a, ()> {
		let state = self.0.clone();

		Box::pin(async move { Self::change_status_now(state, cid, status) })
	}
}
