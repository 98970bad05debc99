// self
use openbanking_broker::{
	auth::{
		BankId, Cid, ConsentStatus, NewConsent, NewToken, SessionRef, TokenSecret, TokenStatus,
		TppId, TrackingId, UserId,
	},
	store::{ConsentStore, MemoryConsentStore, StoreError},
};

fn new_consent(tracking: &str, session: &str) -> NewConsent {
	NewConsent {
		tracking_id: TrackingId::new(tracking).expect("Tracking id fixture should be valid."),
		session_ref: SessionRef::new(session).expect("Session fixture should be valid."),
		bank: BankId::new("bank-a").expect("Bank fixture should be valid."),
		consent_id: format!("intent-{tracking}"),
		status: ConsentStatus::AwaitingAuthorisation,
		expires_at: None,
		transaction_from: None,
		transaction_to: None,
		token: NewToken::placeholder("cc-token"),
	}
}

fn refreshed(resource: &str) -> NewToken {
	NewToken {
		access_token: TokenSecret::new("cc-token"),
		resource_access_token: Some(TokenSecret::new(resource)),
		resource_refresh_token: Some(TokenSecret::new("refresh-1")),
		status: TokenStatus::Authorised,
		expires_in: 3600,
		expires_at: Some("2099-01-01T00:00:00Z".into()),
	}
}

#[tokio::test]
async fn save_assigns_identifiers_and_indexes_tracking_id() {
	let store = MemoryConsentStore::default();
	let saved = store
		.save_consent(new_consent("track-1", "session-1"))
		.await
		.expect("Saving a consent into the memory store should succeed.");

	assert_eq!(saved.tokens.len(), 1);
	assert_eq!(saved.tokens[0].cid, saved.cid);
	assert_eq!(saved.tokens[0].status, TokenStatus::AwaitingAuthorisation);

	let by_tracking = store
		.find_by_tracking_id(&saved.tracking_id)
		.await
		.expect("Tracking lookup should succeed.")
		.expect("Saved consent should be found by tracking id.");

	assert_eq!(by_tracking.cid, saved.cid);

	let err = store
		.save_consent(new_consent("track-1", "session-2"))
		.await
		.expect_err("Duplicate tracking ids must conflict.");

	assert!(matches!(err, StoreError::Conflict { .. }));
}

#[tokio::test]
async fn supersede_expires_previous_rows_and_orders_newest_first() {
	let store = MemoryConsentStore::default();
	let saved = store
		.save_consent(new_consent("track-2", "session-1"))
		.await
		.expect("Saving a consent into the memory store should succeed.");

	store.supersede_token(&saved.cid, refreshed("resource-1")).await.expect("First supersede.");
	store.supersede_token(&saved.cid, refreshed("resource-2")).await.expect("Second supersede.");

	let consent = store.get(&saved.cid).expect("Consent should remain stored.");
	let statuses = consent.tokens.iter().map(|token| token.status).collect::<Vec<_>>();

	assert_eq!(statuses, [TokenStatus::Authorised, TokenStatus::Expired, TokenStatus::Expired]);
	assert_eq!(
		consent.live_token().and_then(|token| token.resource_access_token.as_ref()),
		Some(&TokenSecret::new("resource-2"))
	);
}

#[tokio::test]
async fn status_lookups_and_writes_respect_existence() {
	let store = MemoryConsentStore::default();
	let saved = store
		.save_consent(new_consent("track-3", "session-1"))
		.await
		.expect("Saving a consent into the memory store should succeed.");

	assert!(
		store
			.find_by_cid_and_status(&saved.cid, ConsentStatus::Authorised)
			.await
			.expect("Status lookup should succeed.")
			.is_none()
	);

	store
		.change_consent_status(&saved.cid, ConsentStatus::Authorised)
		.await
		.expect("Status change should succeed.");

	assert!(
		store
			.find_by_cid_and_status(&saved.cid, ConsentStatus::Authorised)
			.await
			.expect("Status lookup should succeed.")
			.is_some()
	);

	let marked = store
		.mark_tokens(&saved.cid, TokenStatus::Expired)
		.await
		.expect("Marking tokens should succeed.");

	assert_eq!(marked, 1);

	let missing = Cid::new("cid-missing").expect("Consent identifier should be valid.");
	let err = store
		.change_consent_status(&missing, ConsentStatus::Revoked)
		.await
		.expect_err("Writes to missing consents must fail.");

	assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn user_and_tpp_queries_follow_bound_sessions() {
	let store = MemoryConsentStore::default();
	let user = UserId::new("user-1").expect("User fixture should be valid.");
	let tpp = TppId::new("tpp-1").expect("Tpp fixture should be valid.");
	let other_tpp = TppId::new("tpp-2").expect("Tpp fixture should be valid.");

	store.bind_session(
		SessionRef::new("session-a").expect("Session fixture should be valid."),
		user.clone(),
		tpp.clone(),
	);
	store.bind_session(
		SessionRef::new("session-b").expect("Session fixture should be valid."),
		user.clone(),
		other_tpp,
	);

	let mine = store
		.save_consent(new_consent("track-a", "session-a"))
		.await
		.expect("Saving a consent into the memory store should succeed.");

	store
		.save_consent(new_consent("track-b", "session-b"))
		.await
		.expect("Saving a consent into the memory store should succeed.");

	let awaiting = store
		.find_by_user_and_tpp(&user, &tpp, ConsentStatus::AwaitingAuthorisation)
		.await
		.expect("User query should succeed.");

	assert_eq!(awaiting.iter().map(|c| c.cid.clone()).collect::<Vec<_>>(), [mine.cid]);
	assert!(
		store
			.find_by_user_and_tpp(&user, &tpp, ConsentStatus::Authorised)
			.await
			.expect("User query should succeed.")
			.is_empty()
	);
}
