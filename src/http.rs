//! Transport primitives for bank-facing requests.
//!
//! The broker depends on a single capability, [`SecureHttpClient`], which takes a
//! fully built [`HttpRequest`] and returns the raw [`HttpResponse`]. Mutual TLS,
//! proxies, and connection pooling live behind that seam. Helpers in this module
//! turn responses into broker errors with a consistent operation label.

pub use oauth2::{HttpRequest, HttpResponse, http};

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::{Method, header};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, UpstreamError},
};

/// Header carrying the bank-assigned financial institution id.
pub const FAPI_FINANCIAL_ID: &str = "x-fapi-financial-id";
/// Header carrying a per-call idempotency key.
pub const IDEMPOTENCY_KEY: &str = "x-idempotency-key";

/// Boxed future returned by [`SecureHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// HTTP transport used for every outbound bank call.
///
/// Implementations must not follow redirects: the authorize endpoint's `302`
/// and its `Location` header are part of the contract. Timeouts should be
/// reported as [`TransportError::Timeout`].
pub trait SecureHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes the request and returns status, headers, and body.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}

/// Reqwest transport with a bounded request timeout and redirects disabled.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Timeout applied by [`ReqwestHttpClient::new`].
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Builds a client with [`Self::DEFAULT_TIMEOUT`].
	pub fn new() -> Result<Self> {
		Self::with_timeout(Self::DEFAULT_TIMEOUT)
	}

	/// Builds a client whose requests fail after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it without redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl SecureHttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Builds a request with the given method, URL, headers, and body.
pub(crate) fn build_request(
	method: Method,
	url: &Url,
	headers: &[(&str, &str)],
	body: Vec<u8>,
) -> Result<HttpRequest> {
	let mut builder = http::Request::builder().method(method).uri(url.as_str());

	for (name, value) in headers {
		builder = builder.header(*name, *value);
	}

	builder.body(body).map_err(|e| ConfigError::from(e).into())
}

/// Executes a request, reporting timeouts as unexpected upstream responses.
pub(crate) async fn send<C>(
	client: &C,
	operation: &'static str,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + SecureHttpClient,
{
	client.execute(request).await.map_err(|e| match e {
		TransportError::Timeout =>
			UpstreamError::Unexpected { operation, status: None, body: String::new() }.into(),
		e => e.into(),
	})
}

/// Returns the body when the status is accepted and the body is non-empty.
pub(crate) fn expect_body(
	operation: &'static str,
	response: &HttpResponse,
	accepted: &[u16],
) -> Result<String> {
	let status = response.status().as_u16();
	let body = String::from_utf8_lossy(response.body()).into_owned();

	if !accepted.contains(&status) || body.trim().is_empty() {
		return Err(UpstreamError::Unexpected { operation, status: Some(status), body }.into());
	}

	Ok(body)
}

/// Like [`expect_body`], then parses the body as JSON.
pub(crate) fn expect_json<T>(
	operation: &'static str,
	response: &HttpResponse,
	accepted: &[u16],
) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = expect_body(operation, response, accepted)?;
	let de = &mut serde_json::Deserializer::from_str(&body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| UpstreamError::Malformed { operation, source }.into())
}

/// Returns the `Location` header of a redirect response.
pub(crate) fn location(response: &HttpResponse) -> Option<String> {
	response
		.headers()
		.get(header::LOCATION)
		.and_then(|value| value.to_str().ok())
		.map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			http::StatusCode::from_u16(status).expect("Status fixture should be valid.");

		response
	}

	#[derive(Debug, Deserialize)]
	struct Payload {
		value: u8,
	}

	#[test]
	fn accepted_status_with_body_parses() {
		let parsed: Payload = expect_json("test", &response(201, r#"{"value":7}"#), &[200, 201])
			.expect("Accepted JSON should parse.");

		assert_eq!(parsed.value, 7);
	}

	#[test]
	fn empty_body_is_unexpected() {
		let err = expect_body("test", &response(200, "  "), &[200])
			.expect_err("Empty bodies must be rejected.");

		assert!(matches!(err, Error::Upstream(UpstreamError::Unexpected { status: Some(200), .. })));
	}

	#[test]
	fn rejected_status_keeps_body() {
		let err = expect_body("test", &response(400, r#"{"error":"invalid_grant"}"#), &[200, 201])
			.expect_err("400 must be rejected.");

		match err {
			Error::Upstream(UpstreamError::Unexpected { operation, status, body }) => {
				assert_eq!(operation, "test");
				assert_eq!(status, Some(400));
				assert!(body.contains("invalid_grant"));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn wrong_shape_is_malformed() {
		let err = expect_json::<Payload>("test", &response(200, r#"{"value":"x"}"#), &[200])
			.expect_err("Type mismatches must be rejected.");

		match err {
			Error::Upstream(UpstreamError::Malformed { source, .. }) =>
				assert_eq!(source.path().to_string(), "value"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn request_builder_sets_headers() {
		let url = Url::parse("https://bank.example/token").expect("URL fixture should parse.");
		let request =
			build_request(Method::POST, &url, &[("cache-control", "no-cache")], b"a=b".to_vec())
				.expect("Request should build.");

		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.headers()["cache-control"], "no-cache");
		assert_eq!(request.body(), b"a=b");
	}
}
