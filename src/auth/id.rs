//! Validated identifiers for consents, banks, sessions, and the parties behind them.
//!
//! Identifiers end up in cache keys, OAuth2 `state` values, and URL query strings,
//! so they are restricted to printable ASCII without spaces and capped at
//! [`MAX_ID_LEN`] bytes.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Longest identifier accepted, in bytes.
pub const MAX_ID_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind, e.g. `Consent` or `Bank`.
		kind: &'static str,
	},
	/// The identifier contains a space, control, or non-ASCII character.
	#[error("{kind} identifier contains the disallowed character {found:?}.")]
	InvalidCharacter {
		/// Identifier kind, e.g. `Consent` or `Bank`.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
	/// The identifier is longer than [`MAX_ID_LEN`].
	#[error("{kind} identifier is {len} bytes long; the limit is {max}.", max = MAX_ID_LEN)]
	TooLong {
		/// Identifier kind, e.g. `Consent` or `Bank`.
		kind: &'static str,
		/// Actual length in bytes.
		len: usize,
	},
}

fn validate(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if let Some(found) = value.chars().find(|c| !c.is_ascii_graphic()) {
		return Err(IdentifierError::InvalidCharacter { kind, found });
	}
	if value.len() > MAX_ID_LEN {
		return Err(IdentifierError::TooLong { kind, len: value.len() });
	}

	Ok(())
}

macro_rules! def_id {
	($(#[doc = $doc:literal])* $name:ident => $kind:literal) => {
		$(#[doc = $doc])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Kind label used in errors and `Debug` output.
			pub const KIND: &'static str = $kind;

			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate(Self::KIND, &value).map(|()| Self(value))
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", Self::KIND, self.0)
			}
		}
	};
}

def_id! {
	/// Internal consent identifier; also the credential cache key.
	Cid => "Consent"
}
def_id! {
	/// Identifier assigned to a stored token row.
	TokenId => "Token"
}
def_id! {
	/// Bank (ASPSP) whose settings the config provider resolves.
	BankId => "Bank"
}
def_id! {
	/// Client-supplied idempotency key for consent creation, echoed back as `state`.
	TrackingId => "Tracking"
}
def_id! {
	/// Caller session that initiated a consent.
	SessionRef => "Session"
}
def_id! {
	/// End user owning a consent.
	UserId => "User"
}
def_id! {
	/// Third-party provider acting for the user.
	TppId => "Tpp"
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spaces_controls_and_empty_values_are_rejected() {
		assert_eq!(
			TrackingId::new("track 1"),
			Err(IdentifierError::InvalidCharacter { kind: "Tracking", found: ' ' })
		);
		assert!(Cid::new("cid\n1").is_err(), "Control characters must be rejected.");
		assert!(SessionRef::new("sessión").is_err(), "Non-ASCII must be rejected.");
		assert_eq!(BankId::new(""), Err(IdentifierError::Empty { kind: "Bank" }));

		let cid = Cid::new("cid-123").expect("Consent fixture should be considered valid.");

		assert_eq!(cid.as_ref(), "cid-123");
		assert_eq!(format!("{cid:?}"), "Consent(cid-123)");
	}

	#[test]
	fn deserialization_validates() {
		let bank: BankId =
			serde_json::from_str("\"bank-a\"").expect("Bank should deserialize successfully.");

		assert_eq!(bank.as_ref(), "bank-a");
		assert!(serde_json::from_str::<BankId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced() {
		TrackingId::new("a".repeat(MAX_ID_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			TrackingId::new("a".repeat(MAX_ID_LEN + 1)),
			Err(IdentifierError::TooLong { kind: "Tracking", len: MAX_ID_LEN + 1 })
		);
	}

	#[test]
	fn ids_look_up_by_str() {
		let map: HashMap<Cid, u8> = HashMap::from_iter([(
			Cid::new("cid-123").expect("Consent id used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("cid-123"), Some(&7));
	}
}
