//! Redis-backed [`KvBackend`] for sharing one lease across processes.

// crates.io
use redis::{Client, RedisError, Script, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	store::{KvBackend, StoreError, StoreFuture},
};

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
	return redis.call("DEL", KEYS[1])
else
	return 0
end
"#;

/// [`KvBackend`] speaking to Redis through a reconnecting [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisKv {
	manager: ConnectionManager,
	compare_and_delete: Arc<Script>,
}
impl RedisKv {
	/// Connects to the Redis instance at `url`.
	pub async fn connect(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(map_redis_error)?;

		Self::with_client(client).await
	}

	/// Builds a backend from an existing client.
	pub async fn with_client(client: Client) -> Result<Self, StoreError> {
		let manager = ConnectionManager::new(client).await.map_err(map_redis_error)?;

		Ok(Self::with_manager(manager))
	}

	/// Wraps an already established connection manager.
	pub fn with_manager(manager: ConnectionManager) -> Self {
		Self { manager, compare_and_delete: Arc::new(Script::new(COMPARE_AND_DELETE)) }
	}
}
impl Debug for RedisKv {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisKv(..)")
	}
}
impl KvBackend for RedisKv {
	fn set_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			let reply: Option<String> = redis::cmd("SET")
				.arg(key)
				.arg(value)
				.arg("NX")
				.arg("PX")
				.arg(ttl_millis(key, ttl)?)
				.query_async(&mut conn)
				.await
				.map_err(map_redis_error)?;

			Ok(reply.is_some())
		})
	}

	fn delete_if_equals<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool> {
		let mut conn = self.manager.clone();
		let script = self.compare_and_delete.clone();

		Box::pin(async move {
			let deleted: i64 = script
				.key(key)
				.arg(expected)
				.invoke_async(&mut conn)
				.await
				.map_err(map_redis_error)?;

			Ok(deleted > 0)
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(map_redis_error)
		})
	}

	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, ()> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			redis::cmd("SET")
				.arg(key)
				.arg(value)
				.arg("PX")
				.arg(ttl_millis(key, ttl)?)
				.query_async(&mut conn)
				.await
				.map_err(map_redis_error)
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			redis::cmd("DEL").arg(key).query_async(&mut conn).await.map_err(map_redis_error)
		})
	}
}

/// Converts a TTL into the positive millisecond count `PX` requires.
fn ttl_millis(key: &str, ttl: Duration) -> Result<u64, StoreError> {
	u64::try_from(ttl.whole_milliseconds())
		.ok()
		.filter(|millis| *millis > 0)
		.ok_or_else(|| StoreError::Backend { message: format!("Invalid TTL for `{key}`") })
}

fn map_redis_error(err: RedisError) -> StoreError {
	let message = err.to_string();

	if err.is_io_error()
		|| err.is_connection_refusal()
		|| err.is_connection_dropped()
		|| err.is_timeout()
	{
		StoreError::LockUnavailable { message }
	} else {
		StoreError::Backend { message }
	}
}
