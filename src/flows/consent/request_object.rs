//! Signed authorization request object for the OIDC hybrid flow.

// crates.io
use jsonwebtoken::Algorithm;
use uuid::Uuid;
// self
use crate::{_prelude::*, signing::Signer};

/// `response_type` requested from the authorize endpoint.
pub const RESPONSE_TYPE: &str = "code id_token";
/// `acr` value demanding strong customer authentication.
pub const SCA_ACR: &str = "urn:openbanking:psd2:sca";
/// Lifetime of a request object.
pub const REQUEST_OBJECT_TTL: Duration = Duration::minutes(240);

/// Claims of the request object, serialized in wire order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestObjectClaims {
	/// Issuer configured for the bank (`iss`).
	pub iss: String,
	/// Audience configured for the bank (`aud`).
	pub aud: String,
	/// Always [`RESPONSE_TYPE`].
	pub response_type: String,
	/// OAuth2 client identifier.
	pub client_id: String,
	/// Registered redirect URI.
	pub redirect_uri: String,
	/// Requested scope.
	pub scope: String,
	/// Single-use nonce.
	pub nonce: String,
	/// Tracking id echoed back on the callback.
	pub state: String,
	/// Expiration, seconds since the epoch.
	pub exp: i64,
	/// Issue time, seconds since the epoch.
	pub iat: i64,
	/// Intent binding for the id token and userinfo.
	pub claims: IntentClaims,
}

/// `claims` member binding the authorization to a consent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentClaims {
	/// Claims requested from the userinfo endpoint.
	pub userinfo: UserinfoClaims,
	/// Claims requested in the id token.
	pub id_token: IdTokenClaims,
}

/// Userinfo claim requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserinfoClaims {
	/// Bank-assigned consent id.
	pub openbanking_intent_id: EssentialClaim,
}

/// Id token claim requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Bank-assigned consent id.
	pub openbanking_intent_id: EssentialClaim,
	/// Authentication context class.
	pub acr: EssentialClaim,
}

/// Individual claim request with a required value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssentialClaim {
	/// Requested value.
	pub value: String,
	/// Always `true` for the broker's requests.
	pub essential: bool,
}
impl EssentialClaim {
	fn essential(value: impl Into<String>) -> Self {
		Self { value: value.into(), essential: true }
	}
}

/// Inputs to a request object besides the consent-specific intent id.
#[derive(Clone, Debug)]
pub(crate) struct RequestObjectParams<'a> {
	pub iss: &'a str,
	pub aud: &'a str,
	pub client_id: &'a str,
	pub redirect_uri: &'a str,
	pub scope: &'a str,
	pub state: &'a str,
}

impl RequestObjectClaims {
	pub(crate) fn new(params: &RequestObjectParams, consent_id: &str, now: OffsetDateTime) -> Self {
		Self {
			iss: params.iss.into(),
			aud: params.aud.into(),
			response_type: RESPONSE_TYPE.into(),
			client_id: params.client_id.into(),
			redirect_uri: params.redirect_uri.into(),
			scope: params.scope.into(),
			nonce: Uuid::new_v4().to_string(),
			state: params.state.into(),
			exp: (now + REQUEST_OBJECT_TTL).unix_timestamp(),
			iat: now.unix_timestamp(),
			claims: IntentClaims {
				userinfo: UserinfoClaims {
					openbanking_intent_id: EssentialClaim::essential(consent_id),
				},
				id_token: IdTokenClaims {
					openbanking_intent_id: EssentialClaim::essential(consent_id),
					acr: EssentialClaim::essential(SCA_ACR),
				},
			},
		}
	}

	/// Signs the claims with PS256.
	pub async fn sign(&self, signer: &Signer) -> Result<String> {
		signer.sign_claims(self, Algorithm::PS256).await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn claims_serialize_in_wire_order() {
		let params = RequestObjectParams {
			iss: "client-123",
			aud: "https://bank.example",
			client_id: "client-123",
			redirect_uri: "https://tpp.example/callback",
			scope: "accounts",
			state: "track-1",
		};
		let now = OffsetDateTime::UNIX_EPOCH;
		let claims = RequestObjectClaims::new(&params, "intent-1", now);
		let json = serde_json::to_string(&claims).expect("Claims should serialize.");
		let order = [
			"\"iss\"",
			"\"aud\"",
			"\"response_type\"",
			"\"client_id\"",
			"\"redirect_uri\"",
			"\"scope\"",
			"\"nonce\"",
			"\"state\"",
			"\"exp\"",
			"\"iat\"",
			"\"claims\"",
		];
		let positions = order
			.iter()
			.map(|key| json.find(key).expect("Every claim should be present."))
			.collect::<Vec<_>>();

		assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
		assert_eq!(claims.exp - claims.iat, 240 * 60);
		assert!(json.ends_with(
			r#""claims":{"userinfo":{"openbanking_intent_id":{"value":"intent-1","essential":true}},"id_token":{"openbanking_intent_id":{"value":"intent-1","essential":true},"acr":{"value":"urn:openbanking:psd2:sca","essential":true}}}}"#
		));
	}

	#[test]
	fn nonces_are_unique() {
		let params = RequestObjectParams {
			iss: "iss",
			aud: "aud",
			client_id: "client",
			redirect_uri: "https://tpp.example/callback",
			scope: "accounts",
			state: "track-2",
		};
		let now = OffsetDateTime::now_utc();

		assert_ne!(
			RequestObjectClaims::new(&params, "intent", now).nonce,
			RequestObjectClaims::new(&params, "intent", now).nonce
		);
	}
}
