//! Broker-level error types shared across flows, signing, caches, and stores.

// crates.io
use jsonwebtoken::Algorithm;
// self
use crate::{
	_prelude::*,
	auth::{BankId, Cid, TrackingId},
	config::ConfigName,
	signing::KeyName,
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Consent store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Credential cache failure surfaced outside the best-effort paths.
	#[error(transparent)]
	Cache(#[from] crate::cache::CacheError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// JWT signing or verification failure.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Bank endpoint answered with something the broker cannot use.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No consent exists for the identifier.
	#[error("Consent `{cid}` does not exist.")]
	ConsentNotFound {
		/// Internal consent identifier.
		cid: Cid,
	},
	/// Consent exists but is not usable for the requested bank.
	#[error("Consent `{cid}` is not authorised for this bank.")]
	ConsentNotAuthorised {
		/// Internal consent identifier.
		cid: Cid,
	},
	/// Consent has passed its expiration or holds no usable token; it has been revoked.
	#[error("Consent `{cid}` has expired.")]
	ConsentExpired {
		/// Internal consent identifier.
		cid: Cid,
	},
	/// Live token is stale and carries no refresh token; the consent is left as is.
	#[error("Consent `{cid}` has a stale resource token and nothing to refresh it with.")]
	TokenNotRefreshable {
		/// Internal consent identifier.
		cid: Cid,
	},
	/// Callback arrived for a consent that is not waiting on the user.
	#[error("Consent tracked by `{tracking_id}` is not awaiting authorisation.")]
	ConsentNotAwaitingAuthorisation {
		/// Tracking identifier echoed back as `state`.
		tracking_id: TrackingId,
	},
	/// Consent creation reused a tracking identifier.
	#[error("Tracking id `{tracking_id}` is already bound to a consent.")]
	TrackingIdInUse {
		/// Duplicate tracking identifier.
		tracking_id: TrackingId,
	},
	/// Stored timestamp cannot be parsed as RFC 3339.
	#[error("Stored {field} timestamp `{value}` is malformed.")]
	MalformedTimestamp {
		/// Field that carried the timestamp.
		field: &'static str,
		/// Raw stored value.
		value: String,
		/// Underlying parse failure.
		#[source]
		source: time::error::Parse,
	},
	/// Instant could not be rendered for storage.
	#[error("Timestamp could not be formatted.")]
	TimestampFormat(#[source] time::error::Format),
	/// Outbound JSON payload could not be serialized.
	#[error("{operation} payload could not be serialized.")]
	Payload {
		/// Operation that built the payload.
		operation: &'static str,
		/// Underlying serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// Operation exists as a contract placeholder only.
	#[error("{operation} is not implemented.")]
	NotImplemented {
		/// Operation label.
		operation: &'static str,
	},
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Bank configuration lacks a required entry.
	#[error("Bank `{bank}` has no `{name}` configured.")]
	NotFound {
		/// Bank whose configuration was queried.
		bank: BankId,
		/// Missing configuration key.
		name: ConfigName,
	},
	/// Configured URL cannot be parsed.
	#[error("Bank `{bank}` has an invalid `{name}` URL.")]
	InvalidUrl {
		/// Bank whose configuration was queried.
		bank: BankId,
		/// Configuration key holding the URL.
		name: ConfigName,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration source could not be read or parsed.
	#[error("Configuration source `{origin}` could not be loaded.")]
	Load {
		/// File path or environment variable name.
		origin: String,
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
	/// Required environment variable is absent.
	#[error("Environment variable `{name}` is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	pub(crate) fn load(
		origin: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Load { origin: origin.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while producing or checking JWTs.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Algorithm outside RS256, PS256, and HS256.
	#[error("Signing algorithm {algorithm:?} is not supported.")]
	UnsupportedAlgorithm {
		/// Rejected algorithm.
		algorithm: Algorithm,
	},
	/// Key material could not be read or parsed.
	#[error("The {key} signing key could not be loaded.")]
	KeyLoad {
		/// Logical key that failed.
		key: KeyName,
		/// Underlying IO or parse failure.
		#[source]
		source: BoxError,
	},
	/// Token header names a different algorithm than the verifier expects.
	#[error("Token is signed with {found:?} but {expected:?} was expected.")]
	AlgorithmMismatch {
		/// Algorithm required by the caller.
		expected: Algorithm,
		/// Algorithm carried by the token header.
		found: Algorithm,
	},
	/// Claims or header could not be serialized.
	#[error("JWT claims could not be serialized.")]
	Claims(#[source] serde_json::Error),
	/// Signature computation failed.
	#[error("JWT could not be signed.")]
	Encode(#[source] jsonwebtoken::errors::Error),
	/// Token is malformed or its signature does not verify.
	#[error("JWT failed verification.")]
	Verify(#[source] jsonwebtoken::errors::Error),
}

/// Bank responses that do not satisfy the expected contract.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Status code outside the accepted set, empty body, or timeout.
	#[error("{operation} returned an unexpected response (status {status:?}).")]
	Unexpected {
		/// Operation that issued the request.
		operation: &'static str,
		/// HTTP status code; `None` when the request timed out.
		status: Option<u16>,
		/// Raw response body kept for diagnostics.
		body: String,
	},
	/// Response body does not match the expected JSON shape.
	#[error("{operation} returned malformed JSON.")]
	Malformed {
		/// Operation that issued the request.
		operation: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Grant lifetime is missing, negative, or too large to turn into an expiration.
	#[error("{operation} returned an unusable expires_in ({expires_in:?}).")]
	InvalidLifetime {
		/// Operation that issued the request.
		operation: &'static str,
		/// Lifetime in seconds as reported by the bank.
		expires_in: Option<i64>,
	},
}
impl UpstreamError {
	/// Returns the HTTP status carried by an unexpected response, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unexpected { status, .. } => *status,
			Self::Malformed { .. } | Self::InvalidLifetime { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the bank.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request to the bank timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the bank.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}
