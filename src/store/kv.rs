//! Minimal key-value contract the distributed lease store runs on.
//!
//! Backends must make each primitive atomic on their side: `set_if_absent` is the lock's
//! compare-and-set, and `delete_if_equals` keeps a holder from deleting somebody else's lock.

// self
use crate::{
	_prelude::*,
	store::{StoreError, StoreFuture},
};

/// Atomic key-value primitives with per-key time-to-live.
pub trait KvBackend
where
	Self: 'static + Send + Sync,
{
	/// Stores `value` under `key` with `ttl` only if the key is absent. Returns whether it did.
	fn set_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, bool>;

	/// Deletes `key` only if it currently holds `expected`. Returns whether it did.
	fn delete_if_equals<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool>;

	/// Reads the live value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, replacing any previous value, expiring after `ttl`.
	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, ()>;

	/// Deletes `key`; deleting a missing key succeeds.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	expires_at: OffsetDateTime,
}
impl Entry {
	fn is_live_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

type EntryMap = Arc<Mutex<HashMap<String, Entry>>>;

/// In-process TTL map implementing [`KvBackend`].
///
/// Clones share the same map, which lets tests stand up several "processes" against one
/// backend. Expired entries are evicted lazily on access.
#[derive(Clone, Debug, Default)]
pub struct MemoryKv(EntryMap);
impl MemoryKv {
	/// Returns `true` if `key` holds a live value.
	pub fn contains(&self, key: &str) -> bool {
		let now = OffsetDateTime::now_utc();

		self.0.lock().get(key).is_some_and(|entry| entry.is_live_at(now))
	}

	/// Remaining TTL of `key`, if it holds a live value.
	pub fn ttl(&self, key: &str) -> Option<Duration> {
		let now = OffsetDateTime::now_utc();

		self.0
			.lock()
			.get(key)
			.filter(|entry| entry.is_live_at(now))
			.map(|entry| entry.expires_at - now)
	}

	fn live_value(map: &mut HashMap<String, Entry>, key: &str, now: OffsetDateTime) -> Option<String> {
		match map.get(key) {
			Some(entry) if entry.is_live_at(now) => Some(entry.value.clone()),
			Some(_) => {
				map.remove(key);

				None
			},
			None => None,
		}
	}

	fn insert(map: &mut HashMap<String, Entry>, key: &str, value: &str, ttl: Duration) {
		let expires_at = OffsetDateTime::now_utc() + ttl;

		map.insert(key.to_owned(), Entry { value: value.to_owned(), expires_at });
	}
}
impl KvBackend for MemoryKv {
	fn set_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			if !ttl.is_positive() {
				return Err(StoreError::Backend { message: format!("Invalid TTL for `{key}`") });
			}

			let mut map = self.0.lock();

			if Self::live_value(&mut map, key, OffsetDateTime::now_utc()).is_some() {
				return Ok(false);
			}

			Self::insert(&mut map, key, value, ttl);

			Ok(true)
		})
	}

	fn delete_if_equals<'a>(&'a self, key: &'a str, expected: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut map = self.0.lock();

			match Self::live_value(&mut map, key, OffsetDateTime::now_utc()) {
				Some(current) if current == expected => {
					map.remove(key);

					Ok(true)
				},
				_ => Ok(false),
			}
		})
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			Ok(Self::live_value(&mut self.0.lock(), key, OffsetDateTime::now_utc()))
		})
	}

	fn set_with_ttl<'a>(
		&'a self,
		key: &'a str,
		value: &'a str,
		ttl: Duration,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			if !ttl.is_positive() {
				return Err(StoreError::Backend { message: format!("Invalid TTL for `{key}`") });
			}

			Self::insert(&mut self.0.lock(), key, value, ttl);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.0.lock().remove(key);

			Ok(())
		})
	}
}
