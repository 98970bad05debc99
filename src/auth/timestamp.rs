//! RFC 3339 helpers for timestamps persisted as strings.
//!
//! Stored values are parsed on every read so that a corrupted row surfaces as
//! [`Error::MalformedTimestamp`] instead of being defaulted.

// crates.io
use time::{UtcOffset, format_description::well_known::Rfc3339, macros::format_description};
// self
use crate::_prelude::*;

/// Formats an instant as a second-precision UTC RFC 3339 string.
pub fn format_timestamp(at: OffsetDateTime) -> Result<String> {
	at.to_offset(UtcOffset::UTC)
		.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
		.map_err(Error::TimestampFormat)
}

/// Parses a stored RFC 3339 timestamp, tagging failures with the owning field.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<OffsetDateTime> {
	OffsetDateTime::parse(value, &Rfc3339).map_err(|source| Error::MalformedTimestamp {
		field,
		value: value.to_owned(),
		source,
	})
}

/// Parses an optional stored timestamp.
pub fn parse_optional_timestamp(
	field: &'static str,
	value: Option<&str>,
) -> Result<Option<OffsetDateTime>> {
	value.map(|raw| parse_timestamp(field, raw)).transpose()
}
