//! OAuth2 grant exchanges against a bank's token endpoint.
//!
//! [`TokenService`] implements the three grants the broker needs. Each call
//! resolves its bank settings first, so a missing configuration value fails
//! before anything is sent. Requests are form-encoded POSTs carrying the FAPI
//! header set; only `200`/`201` with a non-empty JSON body counts as success.

// crates.io
use oauth2::http::{Method, header};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{BankId, TokenSecret},
	config::{ConfigName, ConfigProvider},
	error::UpstreamError,
	http::{self, FAPI_FINANCIAL_ID, SecureHttpClient},
	obs::{self, FlowKind},
};

/// Margin subtracted from `expires_in` so tokens are refreshed before the bank expires them.
pub const TOKEN_EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(300);

const ACCEPTED_STATUSES: [u16; 2] = [200, 201];

/// OAuth 2.0 grant types issued by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant, used once after the bank callback.
	AuthorizationCode,
	/// Refresh Token grant for expired resource tokens.
	RefreshToken,
	/// Client Credentials grant for consent-endpoint access.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
		}
	}

	const fn flow(self) -> FlowKind {
		match self {
			GrantType::AuthorizationCode => FlowKind::AuthorizationCode,
			GrantType::RefreshToken => FlowKind::Refresh,
			GrantType::ClientCredentials => FlowKind::ClientCredentials,
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Successful token endpoint response.
#[derive(Clone, Debug)]
pub struct AccessTokenGrant {
	/// Grant that produced the response.
	pub grant_type: GrantType,
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Refresh token, when issued.
	pub refresh_token: Option<TokenSecret>,
	/// Raw lifetime in seconds as reported by the bank; optional per RFC 6749.
	pub expires_in: Option<i64>,
	/// Granted scope, when echoed back.
	pub scope: Option<String>,
}
impl AccessTokenGrant {
	fn from_response(grant_type: GrantType, response: TokenEndpointResponse) -> Self {
		Self {
			grant_type,
			access_token: TokenSecret::new(response.access_token),
			refresh_token: response.refresh_token.map(TokenSecret::new).filter(|t| !t.is_empty()),
			expires_in: response.expires_in,
			scope: response.scope,
		}
	}

	/// Expiration for a grant issued at `issued_at`, with the safety margin applied.
	///
	/// A missing or negative `expires_in`, or one that overflows the calendar, is
	/// rejected as [`UpstreamError::InvalidLifetime`].
	pub fn expires_at(&self, issued_at: OffsetDateTime) -> Result<OffsetDateTime, UpstreamError> {
		let invalid = || UpstreamError::InvalidLifetime {
			operation: self.grant_type.as_str(),
			expires_in: self.expires_in,
		};
		let seconds = self.expires_in.filter(|seconds| *seconds >= 0).ok_or_else(invalid)?;

		issued_at
			.checked_add(Duration::seconds(seconds))
			.and_then(|at| at.checked_sub(TOKEN_EXPIRY_SAFETY_MARGIN))
			.ok_or_else(invalid)
	}
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	scope: Option<String>,
}

/// Executes OAuth2 grants for any configured bank.
pub struct TokenService<C>
where
	C: ?Sized + SecureHttpClient,
{
	config: Arc<dyn ConfigProvider>,
	http_client: Arc<C>,
}
impl<C> TokenService<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Creates a service backed by the given configuration and transport.
	pub fn new(config: Arc<dyn ConfigProvider>, http_client: Arc<C>) -> Self {
		Self { config, http_client }
	}

	/// `client_credentials` grant; returns the access token for consent endpoints.
	///
	/// The lifetime is not used, so responses without `expires_in` are accepted.
	pub async fn access_token(&self, bank: &BankId, scope: &str) -> Result<TokenSecret> {
		self.exchange(bank, GrantType::ClientCredentials, &[("scope", scope)])
			.await
			.map(|grant| grant.access_token)
	}

	/// `refresh_token` grant for an expired resource token.
	pub async fn refresh_access_token(
		&self,
		bank: &BankId,
		scope: &str,
		refresh_token: &str,
	) -> Result<AccessTokenGrant> {
		self.exchange(
			bank,
			GrantType::RefreshToken,
			&[("scope", scope), ("refresh_token", refresh_token)],
		)
		.await
	}

	/// `authorization_code` grant using the bank's configured redirect URI.
	pub async fn resource_access_refresh_token(
		&self,
		bank: &BankId,
		code: &str,
	) -> Result<AccessTokenGrant> {
		let redirect = self.config.find(bank, ConfigName::RedirectUrl).await?;

		self.exchange(
			bank,
			GrantType::AuthorizationCode,
			&[("redirect_uri", redirect.as_str()), ("code", code)],
		)
		.await
	}

	async fn exchange(
		&self,
		bank: &BankId,
		grant: GrantType,
		params: &[(&str, &str)],
	) -> Result<AccessTokenGrant> {
		let operation = grant.as_str();

		obs::observe(grant.flow(), "token_endpoint", async move {
			let endpoint = self.config.find_url(bank, ConfigName::TokenEndpoint).await?;
			let client_id = self.config.find(bank, ConfigName::ClientId).await?;
			let financial_id = self.config.find(bank, ConfigName::FinancialId).await?;
			let mut form = form_urlencoded::Serializer::new(String::new());

			form.append_pair("grant_type", grant.as_str());
			form.append_pair("client_id", &client_id);

			for (name, value) in params {
				form.append_pair(name, value);
			}

			let request = http::build_request(
				Method::POST,
				&endpoint,
				&[
					(header::ACCEPT.as_str(), "application/json"),
					(header::CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded"),
					(header::CACHE_CONTROL.as_str(), "no-cache"),
					(FAPI_FINANCIAL_ID, financial_id.as_str()),
				],
				form.finish().into_bytes(),
			)?;
			let response = http::send(self.http_client.as_ref(), operation, request).await?;

			http::expect_json::<TokenEndpointResponse>(operation, &response, &ACCEPTED_STATUSES)
				.map(|response| AccessTokenGrant::from_response(grant, response))
		})
		.await
	}
}
impl<C> Clone for TokenService<C>
where
	C: ?Sized + SecureHttpClient,
{
	fn clone(&self) -> Self {
		Self { config: self.config.clone(), http_client: self.http_client.clone() }
	}
}
impl<C> Debug for TokenService<C>
where
	C: ?Sized + SecureHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenService(..)")
	}
}
