//! Redis-backed [`CredentialCache`] shared across processes.

// std
use std::env;
// crates.io
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	cache::{CacheError, CacheFuture, CacheTtl, CredentialCache},
};

/// Cache backed by a multiplexed Redis connection that reconnects on failure.
///
/// Clones share the underlying connection manager.
#[derive(Clone)]
pub struct RedisCache {
	conn: ConnectionManager,
}
impl RedisCache {
	/// Environment variable holding the Redis address.
	pub const HOST_ENV: &'static str = "REDIS_HOST";
	/// Address used when [`Self::HOST_ENV`] is unset.
	pub const DEFAULT_URL: &'static str = "redis://127.0.0.1:6379";

	/// Connects to the Redis server at `url`.
	pub async fn connect(url: &str) -> Result<Self, CacheError> {
		let client = Client::open(normalize_url(url))?;
		let conn = ConnectionManager::new(client).await?;

		Ok(Self { conn })
	}

	/// Connects using `REDIS_HOST`, falling back to [`Self::DEFAULT_URL`].
	pub async fn from_env() -> Result<Self, CacheError> {
		let url = env::var(Self::HOST_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());

		Self::connect(&url).await
	}

	/// Wraps an existing connection manager.
	pub fn with_connection_manager(conn: ConnectionManager) -> Self {
		Self { conn }
	}

	/// Round-trips a `PING` to confirm the server is reachable.
	pub async fn ping(&self) -> Result<(), CacheError> {
		let mut conn = self.conn.clone();
		let reply: String = redis::cmd("PING").query_async(&mut conn).await?;

		if reply == "PONG" {
			Ok(())
		} else {
			Err(CacheError::Backend { message: format!("Unexpected PING reply `{reply}`") })
		}
	}
}
impl Debug for RedisCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisCache(..)")
	}
}
impl CredentialCache for RedisCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<String>> {
		let mut conn = self.conn.clone();

		Box::pin(async move { Ok(conn.get::<_, Option<String>>(key).await?) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl: CacheTtl) -> CacheFuture<'a, ()> {
		let mut conn = self.conn.clone();

		Box::pin(async move {
			match ttl.whole_seconds() {
				Some(seconds) => conn.set_ex::<_, _, ()>(key, value, seconds).await?,
				None => conn.set::<_, _, ()>(key, value).await?,
			}

			Ok(())
		})
	}
}

impl From<RedisError> for CacheError {
	fn from(e: RedisError) -> Self {
		Self::Backend { message: e.to_string() }
	}
}

// Accepts bare `host:port` addresses as well as full `redis://` URLs.
fn normalize_url(raw: &str) -> String {
	if raw.contains("://") {
		raw.to_owned()
	} else if raw.starts_with(':') {
		format!("redis://127.0.0.1{raw}")
	} else {
		format!("redis://{raw}")
	}
}
