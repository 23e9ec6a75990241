//! Lease store contract and built-in store implementations.
//!
//! A [`LeaseStore`] owns the cached [`Lease`] and the critical section that serializes refreshes.
//! The coordinator always follows acquire -> read -> (refresh -> write) -> release, so stores only
//! need atomicity for their own primitive operations.

pub mod distributed;
pub mod kv;
pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use distributed::{DistributedLeaseStore, LockRetryPolicy};
pub use kv::{KvBackend, MemoryKv};
pub use memory::MemoryLeaseStore;

// crates.io
use async_lock::MutexGuardArc;
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, lease::Lease};

/// Boxed future returned by [`LeaseStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the shared credential lease.
pub trait LeaseStore
where
	Self: Send + Sync,
{
	/// Waits until the caller holds the exclusive right to refresh, or `timeout` elapses.
	fn acquire(&self, timeout: Duration) -> StoreFuture<'_, CriticalSection>;

	/// Releases a held critical section. Releasing twice yields [`StoreError::NotHeld`].
	fn release<'a>(&'a self, section: &'a mut CriticalSection) -> StoreFuture<'a, ()>;

	/// Reads the cached lease as observed at `now`.
	///
	/// Fails with [`StoreError::NotPresent`] or [`StoreError::Expired`] on a cache miss.
	fn read(&self, now: OffsetDateTime) -> StoreFuture<'_, Lease>;

	/// Unconditionally overwrites the cached lease.
	fn write(&self, lease: Lease, now: OffsetDateTime) -> StoreFuture<'_, ()>;

	/// Removes the cached lease; clearing an empty store succeeds.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Hook run when a still-held section is dropped without an explicit release.
pub(crate) type AbandonHook = Box<dyn FnOnce(String) + Send + Sync>;

/// Handle proving its holder may refresh the lease.
///
/// The in-process variant keeps the owned mutex guard inside the handle, so dropping the handle
/// releases the local lock even when an explicit [`LeaseStore::release`] never runs. The
/// distributed variant installs an abandon hook that schedules the compare-and-delete, so a
/// cancelled caller does not pin the lock key for its whole TTL.
pub struct CriticalSection {
	holder: String,
	acquired_at: OffsetDateTime,
	guard: Option<MutexGuardArc<()>>,
	on_abandon: Option<AbandonHook>,
	held: bool,
}
impl CriticalSection {
	const HOLDER_LEN: usize = 22;

	pub(crate) fn local(guard: MutexGuardArc<()>) -> Self {
		let mut section = Self::new(random_holder());

		section.guard = Some(guard);

		section
	}

	pub(crate) fn remote(holder: String) -> Self {
		Self::new(holder)
	}

	fn new(holder: String) -> Self {
		Self {
			holder,
			acquired_at: OffsetDateTime::now_utc(),
			guard: None,
			on_abandon: None,
			held: true,
		}
	}

	/// Installs the hook that releases the section if the handle is dropped while held.
	pub(crate) fn on_abandon(mut self, hook: impl 'static + FnOnce(String) + Send + Sync) -> Self {
		self.on_abandon = Some(Box::new(hook));

		self
	}

	/// Identity of the holder (the value written to a distributed lock key).
	pub fn holder(&self) -> &str {
		&self.holder
	}

	/// Instant the section was acquired.
	pub fn acquired_at(&self) -> OffsetDateTime {
		self.acquired_at
	}

	/// Returns `true` until the section is released.
	pub fn is_held(&self) -> bool {
		self.held
	}

	/// Marks the section released, dropping any local guard and abandon hook.
	///
	/// Returns [`StoreError::NotHeld`] when it was already released.
	pub(crate) fn surrender(&mut self) -> Result<(), StoreError> {
		if !self.held {
			return Err(StoreError::NotHeld);
		}

		self.held = false;
		self.guard = None;
		self.on_abandon = None;

		Ok(())
	}
}
impl Drop for CriticalSection {
	fn drop(&mut self) {
		if !self.held {
			return;
		}

		self.held = false;

		if let Some(hook) = self.on_abandon.take() {
			hook(std::mem::take(&mut self.holder));
		}
	}
}
impl Debug for CriticalSection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CriticalSection")
			.field("holder", &self.holder)
			.field("acquired_at", &self.acquired_at)
			.field("local", &self.guard.is_some())
			.field("releases_on_drop", &self.on_abandon.is_some())
			.field("held", &self.held)
			.finish()
	}
}

/// Error type produced by [`LeaseStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No lease was ever cached (or it was cleared).
	#[error("No lease is cached.")]
	NotPresent,
	/// A lease is cached but past its safety-margined deadline.
	#[error("Cached lease has expired.")]
	Expired,
	/// `release` was called without a matching held section.
	#[error("Critical section is not held by this caller.")]
	NotHeld,
	/// The critical section could not be obtained within the allotted budget.
	#[error("Timed out waiting for the refresh lock.")]
	LockTimeout,
	/// The coordination backend could not be reached.
	#[error("Refresh lock backend is unavailable: {message}.")]
	LockUnavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Returns `true` for the expected signals that trigger a refresh.
	pub fn is_cache_miss(&self) -> bool {
		matches!(self, Self::NotPresent | Self::Expired)
	}
}

/// Converts a (possibly negative) `time` duration into a std duration, clamping at zero.
pub(crate) fn std_duration(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}

pub(crate) fn random_holder() -> String {
	rand::rng().sample_iter(Alphanumeric).take(CriticalSection::HOLDER_LEN).map(char::from).collect()
}
