//! Consent authorization facade: consent creation, status lookup, and deletion.
//!
//! [`Broker::create_consent`] registers an account-access consent with the bank
//! using a `client_credentials` token, persists it as `AwaitingAuthorisation`,
//! and asks the authorize endpoint where to send the user. The tracking id is
//! checked before anything is sent, so a replayed creation performs no network
//! calls.

pub mod request_object;

pub use request_object::*;

// crates.io
use oauth2::http::{Method, header};
// self
use crate::{
	_prelude::*,
	auth::{
		BankId, Cid, ConsentStatus, NewConsent, NewToken, SessionRef, TrackingId,
		parse_optional_timestamp,
	},
	config::ConfigName,
	error::UpstreamError,
	flows::{ACCOUNTS_SCOPE, Broker, common},
	http::{self, SecureHttpClient},
	obs::{self, FlowKind},
};

const CREATE_ACCEPTED: [u16; 2] = [200, 201];
const FETCH_ACCEPTED: [u16; 1] = [200];

/// Open Banking account-access consent request (`OBReadConsent1`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentRequest {
	/// Requested permissions and validity window.
	pub data: ConsentRequestData,
	/// Risk indicators; empty for account information.
	#[serde(default)]
	pub risk: Risk,
}
impl ConsentRequest {
	/// Requests the given permissions with an open-ended validity.
	pub fn new<I, S>(permissions: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			data: ConsentRequestData {
				permissions: permissions.into_iter().map(Into::into).collect(),
				expiration_date_time: None,
				transaction_from_date_time: None,
				transaction_to_date_time: None,
			},
			risk: Risk::default(),
		}
	}

	/// Sets the RFC 3339 instant at which the permissions expire.
	pub fn with_expiration(mut self, expiration: impl Into<String>) -> Self {
		self.data.expiration_date_time = Some(expiration.into());

		self
	}

	/// Restricts transaction queries to the given RFC 3339 window.
	pub fn with_transaction_window(
		mut self,
		from: Option<impl Into<String>>,
		to: Option<impl Into<String>>,
	) -> Self {
		self.data.transaction_from_date_time = from.map(Into::into);
		self.data.transaction_to_date_time = to.map(Into::into);

		self
	}
}

/// `Data` member of [`ConsentRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentRequestData {
	/// Permission codes such as `ReadAccountsDetail`.
	pub permissions: Vec<String>,
	/// When the permissions expire; open-ended when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiration_date_time: Option<String>,
	/// Start of the transaction query window.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_from_date_time: Option<String>,
	/// End of the transaction query window.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction_to_date_time: Option<String>,
}

/// Risk member; carries no fields for account information.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {}

/// Bank response to a consent creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResponse {
	/// Consent resource as registered by the bank.
	pub data: ConsentResponseData,
}

/// `Data` member of [`ConsentResponse`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResponseData {
	/// Bank-assigned consent id (the intent id).
	pub consent_id: String,
	/// Bank-side status, e.g. `AwaitingAuthorisation`.
	pub status: String,
	/// Creation instant reported by the bank.
	#[serde(default)]
	pub creation_date_time: Option<String>,
	/// Last status change reported by the bank.
	#[serde(default)]
	pub status_update_date_time: Option<String>,
	/// Permissions granted.
	#[serde(default)]
	pub permissions: Vec<String>,
}

impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Registers a consent with `bank` and returns the authorize redirect for the user.
	///
	/// Fails with [`Error::TrackingIdInUse`] before any network call when the
	/// tracking id is already bound. The authorize endpoint must answer `302`
	/// with a `Location` header; anything else is an unexpected upstream response.
	pub async fn create_consent(
		&self,
		session_ref: &SessionRef,
		tracking_id: &TrackingId,
		bank: &BankId,
		request: &ConsentRequest,
	) -> Result<String> {
		obs::observe(FlowKind::CreateConsent, "create_consent", async move {
			self.consents.ensure_tracking_id_unused(tracking_id).await?;

			parse_optional_timestamp(
				"consent expiration",
				request.data.expiration_date_time.as_deref(),
			)?;

			let consent_endpoint = self.config.find_url(bank, ConfigName::ConsentEndpoint).await?;
			let authorize_endpoint =
				self.config.find_url(bank, ConfigName::AuthorizeEndpoint).await?;
			let financial_id = self.config.find(bank, ConfigName::FinancialId).await?;
			let client_id = self.config.find(bank, ConfigName::ClientId).await?;
			let redirect_uri = self.config.find(bank, ConfigName::RedirectUrl).await?;
			let iss = self.config.find(bank, ConfigName::Issuer).await?;
			let aud = self.config.find(bank, ConfigName::Audience).await?;
			let access_token = self.tokens.access_token(bank, ACCOUNTS_SCOPE).await?;
			let body = serde_json::to_vec(request)
				.map_err(|source| Error::Payload { operation: "create_consent", source })?;
			let http_request = common::api_request(
				Method::POST,
				&consent_endpoint,
				&access_token,
				&financial_id,
				body,
			)?;
			let response =
				http::send(self.http_client.as_ref(), "create_consent", http_request).await?;
			let created: ConsentResponse =
				http::expect_json("create_consent", &response, &CREATE_ACCEPTED)?;
			let consent_id = created.data.consent_id;

			self.consents
				.create(NewConsent {
					tracking_id: tracking_id.clone(),
					session_ref: session_ref.clone(),
					bank: bank.clone(),
					consent_id: consent_id.clone(),
					status: ConsentStatus::AwaitingAuthorisation,
					expires_at: request.data.expiration_date_time.clone(),
					transaction_from: request.data.transaction_from_date_time.clone(),
					transaction_to: request.data.transaction_to_date_time.clone(),
					token: NewToken::placeholder(access_token.into_inner()),
				})
				.await?;

			let params = RequestObjectParams {
				iss: &iss,
				aud: &aud,
				client_id: &client_id,
				redirect_uri: &redirect_uri,
				scope: ACCOUNTS_SCOPE,
				state: tracking_id.as_ref(),
			};
			let claims = RequestObjectClaims::new(&params, &consent_id, OffsetDateTime::now_utc());
			let request_object = claims.sign(&self.signer).await?;

			self.authorize(&authorize_endpoint, &claims, &request_object).await
		})
		.await
	}

	/// Fetches the bank's current view of the consent; returns the raw JSON body.
	pub async fn fetch_consent(&self, cid: &Cid, bank: &BankId) -> Result<String> {
		obs::observe(FlowKind::GetConsent, "fetch_consent", async move {
			let consent = self
				.consents
				.find_by_cid(cid)
				.await?
				.ok_or_else(|| Error::ConsentNotFound { cid: cid.clone() })?;
			let base = self.config.find_url(bank, ConfigName::ConsentEndpoint).await?;
			let endpoint =
				common::join_segment(bank, ConfigName::ConsentEndpoint, &base, &consent.consent_id)?;
			let financial_id = self.config.find(bank, ConfigName::FinancialId).await?;
			let access_token = self.tokens.access_token(bank, ACCOUNTS_SCOPE).await?;
			let request = common::api_request(
				Method::GET,
				&endpoint,
				&access_token,
				&financial_id,
				Vec::new(),
			)?;
			let response = http::send(self.http_client.as_ref(), "fetch_consent", request).await?;

			http::expect_body("fetch_consent", &response, &FETCH_ACCEPTED)
		})
		.await
	}

	/// Consent deletion is not supported by the broker.
	pub async fn delete_consent(&self, _cid: &Cid) -> Result<String> {
		Err(Error::NotImplemented { operation: "delete_consent" })
	}

	async fn authorize(
		&self,
		endpoint: &Url,
		claims: &RequestObjectClaims,
		request_object: &str,
	) -> Result<String> {
		const OPERATION: &str = "authorize";

		let mut url = endpoint.clone();
		let scope = format!("openid {}", claims.scope);

		url.query_pairs_mut()
			.append_pair("response_type", RESPONSE_TYPE)
			.append_pair("client_id", &claims.client_id)
			.append_pair("redirect_uri", &claims.redirect_uri)
			.append_pair("scope", &scope)
			.append_pair("nonce", &claims.nonce)
			.append_pair("state", &claims.state)
			.append_pair("request", request_object);

		let request = http::build_request(
			Method::GET,
			&url,
			&[(header::CACHE_CONTROL.as_str(), "no-cache")],
			Vec::new(),
		)?;
		let response = http::send(self.http_client.as_ref(), OPERATION, request).await?;
		let status = response.status().as_u16();

		match http::location(&response) {
			Some(location) if status == 302 && !location.is_empty() => Ok(location),
			_ => Err(UpstreamError::Unexpected {
				operation: OPERATION,
				status: Some(status),
				body: String::from_utf8_lossy(response.body()).into_owned(),
			}
			.into()),
		}
	}
}
