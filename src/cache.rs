//! Credential cache contract and built-in backends.
//!
//! The cache maps a consent id to its current resource access token. It is a
//! read-through accelerator only: the consent store stays authoritative, so a
//! cold, evicted, or failing cache costs one extra refresh round trip and
//! nothing else.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryCache;
#[cfg(feature = "redis")] pub use self::redis::RedisCache;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialCache`] implementations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key-value store with per-entry expiry.
pub trait CredentialCache
where
	Self: Send + Sync,
{
	/// Returns the cached value, or `None` when absent or expired.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>>;

	/// Stores `value` under `key` for the requested lifetime.
	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()>;
}

/// Lifetime requested for a cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTtl {
	/// Backend-specific default: a short TTL in memory, no TTL in Redis.
	ProviderDefault,
	/// Keep the entry until it is overwritten.
	Persistent,
	/// Expire after the given duration.
	After(Duration),
}
impl CacheTtl {
	/// Maps a seconds count to a TTL; non-positive values select the provider default.
	pub fn from_seconds(seconds: i64) -> Self {
		if seconds > 0 { Self::After(Duration::seconds(seconds)) } else { Self::ProviderDefault }
	}

	/// Positive whole seconds carried by [`CacheTtl::After`].
	pub fn whole_seconds(self) -> Option<u64> {
		match self {
			Self::After(ttl) => u64::try_from(ttl.whole_seconds()).ok().filter(|secs| *secs > 0),
			Self::ProviderDefault | Self::Persistent => None,
		}
	}
}

/// Error type produced by [`CredentialCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// Backend-level failure (connection, protocol, command).
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn non_positive_seconds_select_provider_default() {
		assert_eq!(CacheTtl::from_seconds(0), CacheTtl::ProviderDefault);
		assert_eq!(CacheTtl::from_seconds(-30), CacheTtl::ProviderDefault);
		assert_eq!(CacheTtl::from_seconds(90), CacheTtl::After(Duration::seconds(90)));
	}

	#[test]
	fn whole_seconds_only_for_positive_durations() {
		assert_eq!(CacheTtl::After(Duration::seconds(90)).whole_seconds(), Some(90));
		assert_eq!(CacheTtl::After(Duration::milliseconds(500)).whole_seconds(), None);
		assert_eq!(CacheTtl::Persistent.whole_seconds(), None);
	}
}
