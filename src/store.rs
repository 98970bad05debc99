//! Repository contract for consent and token records, plus an in-memory backend.

pub mod memory;

pub use memory::MemoryConsentStore;

// self
use crate::{
	_prelude::*,
	auth::{
		Cid, Consent, ConsentStatus, NewConsent, NewToken, Token, TokenStatus, TppId, TrackingId,
		UserId,
	},
};

/// Boxed future returned by [`ConsentStore`] implementations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for consents and their token rows.
///
/// Lookups return `Ok(None)` for absent records; writes that target a missing
/// consent fail with [`StoreError::NotFound`]. Returned consents carry their
/// token rows newest first. Timestamps are compared by callers, never by the
/// store.
pub trait ConsentStore
where
	Self: Send + Sync,
{
	/// Loads a consent by internal id.
	fn find_by_cid<'a>(&'a self, cid: &'a Cid) -> StoreFuture<'a, Option<Consent>>;

	/// Loads a consent by its creation tracking id.
	fn find_by_tracking_id<'a>(
		&'a self,
		tracking_id: &'a TrackingId,
	) -> StoreFuture<'a, Option<Consent>>;

	/// Loads a consent by internal id when it is in `status`.
	fn find_by_cid_and_status<'a>(
		&'a self,
		cid: &'a Cid,
		status: ConsentStatus,
	) -> StoreFuture<'a, Option<Consent>>;

	/// Lists consents in `status` created by sessions of `user` on behalf of `tpp`.
	fn find_by_user_and_tpp<'a>(
		&'a self,
		user: &'a UserId,
		tpp: &'a TppId,
		status: ConsentStatus,
	) -> StoreFuture<'a, Vec<Consent>>;

	/// Persists a new consent with its first token row and assigns identifiers.
	fn save_consent(&self, consent: NewConsent) -> StoreFuture<'_, Consent>;

	/// Marks every existing token row of the consent `Expired` and appends `token`.
	fn supersede_token<'a>(&'a self, cid: &'a Cid, token: NewToken) -> StoreFuture<'a, Token>;

	/// Sets the status of every token row of the consent; returns the number of rows.
	fn mark_tokens<'a>(&'a self, cid: &'a Cid, status: TokenStatus) -> StoreFuture<'a, usize>;

	/// Changes the consent's status.
	fn change_consent_status<'a>(
		&'a self,
		cid: &'a Cid,
		status: ConsentStatus,
	) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`ConsentStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Write targeted a consent that does not exist.
	#[error("Consent `{cid}` was not found in the store.")]
	NotFound {
		/// Requested consent id.
		cid: String,
	},
	/// Write violated a uniqueness constraint.
	#[error("Store conflict: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("database unreachable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
