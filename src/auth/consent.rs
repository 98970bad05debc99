//! Consent records and their lifecycle status.

// self
use crate::{
	_prelude::*,
	auth::{
		BankId, Cid, NewToken, SessionRef, Token, TokenStatus, TrackingId,
		parse_optional_timestamp,
	},
};

/// Consent lifecycle status; the single source of truth for token usability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsentStatus {
	/// Created at the bank, waiting for the user to authorise.
	AwaitingAuthorisation,
	/// Authorised by the user; tokens may be used.
	Authorised,
	/// Revoked after expiry detection.
	Revoked,
	/// Expired by an external process.
	Expired,
}
impl ConsentStatus {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConsentStatus::AwaitingAuthorisation => "AwaitingAuthorisation",
			ConsentStatus::Authorised => "Authorised",
			ConsentStatus::Revoked => "Revoked",
			ConsentStatus::Expired => "Expired",
		}
	}
}
impl Display for ConsentStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One user's grant of access to one bank.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Consent {
	/// Internal identifier and cache key.
	pub cid: Cid,
	/// Idempotency key supplied at creation.
	pub tracking_id: TrackingId,
	/// Session that initiated the consent.
	pub session_ref: SessionRef,
	/// Bank holding the account.
	pub bank: BankId,
	/// Bank-assigned consent (intent) identifier.
	pub consent_id: String,
	/// Lifecycle status.
	pub status: ConsentStatus,
	/// RFC 3339 consent expiration; `None` means open-ended.
	pub expires_at: Option<String>,
	/// RFC 3339 start of the transaction window.
	pub transaction_from: Option<String>,
	/// RFC 3339 end of the transaction window.
	pub transaction_to: Option<String>,
	/// RFC 3339 creation instant.
	pub created_at: String,
	/// RFC 3339 last-update instant.
	pub updated_at: String,
	/// Token rows, newest first.
	pub tokens: Vec<Token>,
}
impl Consent {
	/// Parses the stored consent expiration.
	pub fn expiration(&self) -> Result<Option<OffsetDateTime>> {
		parse_optional_timestamp("consent expiration", self.expires_at.as_deref())
	}

	/// Returns `true` when the consent's own expiration has passed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> Result<bool> {
		Ok(self.expiration()?.is_some_and(|at| at <= now))
	}

	/// Latest token row still marked [`TokenStatus::Authorised`].
	pub fn live_token(&self) -> Option<&Token> {
		self.tokens.iter().find(|token| token.status == TokenStatus::Authorised)
	}
}

/// Consent fields supplied when persisting a new consent.
#[derive(Clone, Debug)]
pub struct NewConsent {
	/// Idempotency key.
	pub tracking_id: TrackingId,
	/// Initiating session.
	pub session_ref: SessionRef,
	/// Bank holding the account.
	pub bank: BankId,
	/// Bank-assigned consent identifier.
	pub consent_id: String,
	/// Initial status.
	pub status: ConsentStatus,
	/// RFC 3339 consent expiration.
	pub expires_at: Option<String>,
	/// RFC 3339 start of the transaction window.
	pub transaction_from: Option<String>,
	/// RFC 3339 end of the transaction window.
	pub transaction_to: Option<String>,
	/// First token row.
	pub token: NewToken,
}

/// Authorised consent summary returned by active-consent queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveConsent {
	/// Internal consent identifier.
	pub cid: Cid,
	/// Bank holding the account.
	pub bank: BankId,
}
