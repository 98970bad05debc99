//! Redacting wrapper for bearer, refresh, and grant tokens.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Consumes the wrapper, returning the raw token.
	pub fn into_inner(self) -> String {
		self.0
	}

	/// `Authorization` header value presenting the token as a bearer credential.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Whether the bank returned an empty token string.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_never_print_the_token() {
		let secret = TokenSecret::new("resource-access-token");

		assert!(!format!("{secret:?}").contains("resource-access-token"));
		assert!(!format!("{secret}").contains("resource-access-token"));
		assert_eq!(secret.bearer(), "Bearer resource-access-token");
		assert_eq!(secret.into_inner(), "resource-access-token");
	}

	#[test]
	fn blank_tokens_are_empty() {
		assert!(TokenSecret::new(" ").is_empty());
		assert!(!TokenSecret::new("cc-token").is_empty());
	}
}
