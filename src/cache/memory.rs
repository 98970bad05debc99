//! Thread-safe in-process [`CredentialCache`].

// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, CacheTtl, CredentialCache},
};

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: Option<OffsetDateTime>,
}
impl Entry {
	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|at| at > now)
	}
}

type CacheMap = Arc<RwLock<HashMap<String, Entry>>>;

/// Process-local cache with lazy expiry.
///
/// Clones share the same map, so one instance can be handed to every broker in
/// the process.
#[derive(Clone, Debug)]
pub struct MemoryCache {
	entries: CacheMap,
	default_ttl: Duration,
}
impl MemoryCache {
	/// TTL applied to [`CacheTtl::ProviderDefault`] entries.
	pub const DEFAULT_TTL: Duration = Duration::minutes(5);

	/// Overrides the TTL used for [`CacheTtl::ProviderDefault`].
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = ttl;

		self
	}

	/// Number of entries currently held, expired or not.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when no entries are held.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Drops every expired entry.
	pub fn purge_expired(&self) {
		let now = OffsetDateTime::now_utc();

		self.entries.write().retain(|_, entry| entry.is_live_at(now));
	}

	fn get_now(&self, key: &str) -> Option<String> {
		let now = OffsetDateTime::now_utc();

		{
			let guard = self.entries.read();

			match guard.get(key) {
				Some(entry) if entry.is_live_at(now) => return Some(entry.value.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = self.entries.write();

		if guard.get(key).is_some_and(|entry| !entry.is_live_at(now)) {
			guard.remove(key);
		}

		None
	}

	fn set_now(&self, key: &str, value: &str, ttl: CacheTtl) {
		let now = OffsetDateTime::now_utc();
		let expires_at = match ttl {
			CacheTtl::ProviderDefault => Some(now + self.default_ttl),
			CacheTtl::Persistent => None,
			CacheTtl::After(ttl) => Some(now + ttl),
		};

		self.entries.write().insert(key.to_owned(), Entry { value: value.to_owned(), expires_at });
	}
}
impl Default for MemoryCache {
	fn default() -> Self {
		Self { entries: Default::default(), default_ttl: Self::DEFAULT_TTL }
	}
}
impl CredentialCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.get_now(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key, value, ttl);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn entries_expire_lazily() {
		let cache = MemoryCache::default();

		cache
			.set("cid-1", "token-1", CacheTtl::After(Duration::seconds(60)))
			.await
			.expect("Memory cache writes should succeed.");
		cache
			.set("cid-2", "token-2", CacheTtl::After(Duration::seconds(-1)))
			.await
			.expect("Memory cache writes should succeed.");

		assert_eq!(cache.get("cid-1").await.expect("Reads should succeed."), Some("token-1".into()));
		assert_eq!(cache.get("cid-2").await.expect("Reads should succeed."), None);
		assert_eq!(cache.len(), 1, "Expired entries should be evicted on read.");
		assert_eq!(cache.get("cid-3").await.expect("Misses are not errors."), None);
	}

	#[tokio::test]
	async fn provider_default_uses_short_ttl() {
		let cache = MemoryCache::default().with_default_ttl(Duration::seconds(-1));

		cache
			.set("cid-1", "token-1", CacheTtl::ProviderDefault)
			.await
			.expect("Memory cache writes should succeed.");
		cache
			.set("cid-2", "token-2", CacheTtl::Persistent)
			.await
			.expect("Memory cache writes should succeed.");
		cache.purge_expired();

		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get("cid-2").await.expect("Reads should succeed."), Some("token-2".into()));
	}

	#[tokio::test]
	async fn clones_share_entries() {
		let cache = MemoryCache::default();
		let clone = cache.clone();

		clone
			.set("cid-1", "token-1", CacheTtl::Persistent)
			.await
			.expect("Memory cache writes should succeed.");

		assert_eq!(cache.get("cid-1").await.expect("Reads should succeed."), Some("token-1".into()));
	}
}
