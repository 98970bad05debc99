#![cfg(feature = "redis")]

// crates.io
use time::Duration;
use uuid::Uuid;
// self
use openbanking_broker::cache::{CacheTtl, CredentialCache, RedisCache};

async fn connect() -> Option<RedisCache> {
	let cache = RedisCache::from_env().await.ok()?;

	match cache.ping().await {
		Ok(()) => Some(cache),
		Err(e) => {
			eprintln!("Skipping Redis cache test: {e}");

			None
		},
	}
}

#[tokio::test]
async fn values_round_trip_and_expire() {
	let Some(cache) = connect().await else {
		return;
	};
	let key = format!("openbanking-broker-it-{}", Uuid::new_v4());

	assert_eq!(cache.get(&key).await.expect("Redis GET should succeed."), None);

	cache
		.set(&key, "resource-1", CacheTtl::After(Duration::seconds(1)))
		.await
		.expect("Redis SETEX should succeed.");

	assert_eq!(
		cache.get(&key).await.expect("Redis GET should succeed."),
		Some("resource-1".into())
	);

	tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;

	assert_eq!(cache.get(&key).await.expect("Redis GET should succeed."), None);
}

#[tokio::test]
async fn persistent_entries_are_overwritten() {
	let Some(cache) = connect().await else {
		return;
	};
	let key = format!("openbanking-broker-it-{}", Uuid::new_v4());

	cache.set(&key, "first", CacheTtl::Persistent).await.expect("Redis SET should succeed.");
	cache
		.set(&key, "second", CacheTtl::After(Duration::seconds(30)))
		.await
		.expect("Redis SETEX should succeed.");

	assert_eq!(cache.get(&key).await.expect("Redis GET should succeed."), Some("second".into()));
}
