//! Token rows attached to a consent.

pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{Cid, TokenId, parse_optional_timestamp, token::secret::TokenSecret},
};

/// Lifecycle status for a stored token row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Placeholder row written at consent creation, before the user authorises.
	AwaitingAuthorisation,
	/// Row holds the live resource credentials.
	Authorised,
	/// Row was superseded by a refresh or by the authorisation callback.
	Expired,
}

/// One OAuth2 credential set belonging to a consent.
///
/// Rows are append-only: a refresh marks the previous row [`TokenStatus::Expired`]
/// and inserts a new one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
	/// Store-assigned identifier.
	pub id: TokenId,
	/// Owning consent.
	pub cid: Cid,
	/// Token that identified the grant when the row was created.
	pub access_token: TokenSecret,
	/// Bearer token presented to account APIs.
	pub resource_access_token: Option<TokenSecret>,
	/// Refresh token for the resource grant.
	pub resource_refresh_token: Option<TokenSecret>,
	/// Row status.
	pub status: TokenStatus,
	/// Raw `expires_in` reported by the bank.
	pub expires_in: i64,
	/// RFC 3339 instant after which the resource token must be refreshed.
	pub expires_at: Option<String>,
	/// RFC 3339 creation instant.
	pub created_at: String,
	/// RFC 3339 last-update instant.
	pub updated_at: String,
}
impl Token {
	/// Parses the stored resource-token expiration.
	pub fn expiration(&self) -> Result<Option<OffsetDateTime>> {
		parse_optional_timestamp("token expiration", self.expires_at.as_deref())
	}

	/// Resource token and its expiration when the token is still usable at `now`.
	///
	/// Rows without a resource token or an expiration are never fresh.
	pub fn fresh_resource_token(
		&self,
		now: OffsetDateTime,
	) -> Result<Option<(&TokenSecret, OffsetDateTime)>> {
		let Some(resource) = self.resource_access_token.as_ref() else {
			return Ok(None);
		};

		Ok(self.expiration()?.filter(|at| *at > now).map(|at| (resource, at)))
	}
}

/// Token fields supplied when inserting a new row.
#[derive(Clone, Debug)]
pub struct NewToken {
	/// Token that identified the grant.
	pub access_token: TokenSecret,
	/// Bearer token for account APIs.
	pub resource_access_token: Option<TokenSecret>,
	/// Refresh token for the resource grant.
	pub resource_refresh_token: Option<TokenSecret>,
	/// Initial row status.
	pub status: TokenStatus,
	/// Raw `expires_in` reported by the bank.
	pub expires_in: i64,
	/// RFC 3339 expiration with the safety margin already applied.
	pub expires_at: Option<String>,
}
impl NewToken {
	/// Placeholder row stored with a freshly created consent.
	pub fn placeholder(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			resource_access_token: None,
			resource_refresh_token: None,
			status: TokenStatus::AwaitingAuthorisation,
			expires_in: 0,
			expires_at: None,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::format_timestamp;

	fn token(resource: Option<&str>, expires_at: Option<String>) -> Token {
		Token {
			id: TokenId::new("t-1").expect("Token id fixture should be valid."),
			cid: Cid::new("cid-1").expect("Consent id fixture should be valid."),
			access_token: TokenSecret::new("grant"),
			resource_access_token: resource.map(TokenSecret::new),
			resource_refresh_token: None,
			status: TokenStatus::Authorised,
			expires_in: 3600,
			expires_at,
			created_at: "2024-01-01T00:00:00Z".into(),
			updated_at: "2024-01-01T00:00:00Z".into(),
		}
	}

	#[test]
	fn freshness_follows_expiration() {
		let now = OffsetDateTime::now_utc();
		let stamp = |at| format_timestamp(at).expect("Test timestamps should format.");
		let ahead = token(Some("res"), Some(stamp(now + Duration::minutes(5))));
		let (resource, expires_at) = ahead
			.fresh_resource_token(now)
			.expect("Valid timestamps should parse.")
			.expect("A future expiration is fresh.");

		assert_eq!(resource.expose(), "res");
		assert!(expires_at > now);
		assert!(
			token(Some("res"), Some(stamp(now - Duration::minutes(5))))
				.fresh_resource_token(now)
				.expect("Valid timestamps should parse.")
				.is_none()
		);
		assert!(
			token(Some("res"), None)
				.fresh_resource_token(now)
				.expect("Missing expiry is not fresh.")
				.is_none()
		);
		assert!(
			token(None, Some(stamp(now + Duration::minutes(5))))
				.fresh_resource_token(now)
				.expect("Placeholder rows are never fresh.")
				.is_none()
		);
	}

	#[test]
	fn malformed_expiration_is_an_error() {
		let err = token(Some("res"), Some("tomorrow".into()))
			.fresh_resource_token(OffsetDateTime::now_utc())
			.expect_err("Garbage expirations must fail.");

		assert!(matches!(err, Error::MalformedTimestamp { .. }));
	}
}
