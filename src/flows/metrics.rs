//! In-process counters for resource-token outcomes.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared by every clone of a broker.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	cache_hits: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_failures: AtomicU64,
	revocations: AtomicU64,
	swallowed_failures: AtomicU64,
}
impl BrokerMetrics {
	/// Resource tokens served straight from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Refresh grants issued.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Refresh grants that failed and were propagated.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Consents moved to `Revoked` by the resource-token path.
	pub fn revocations(&self) -> u64 {
		self.revocations.load(Ordering::Relaxed)
	}

	/// Best-effort steps (cache reads and writes, revocations) that failed and were logged.
	pub fn swallowed_failures(&self) -> u64 {
		self.swallowed_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_revocation(&self) {
		self.revocations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_swallowed_failure(&self) {
		self.swallowed_failures.fetch_add(1, Ordering::Relaxed);
	}
}
