//! In-process [`LeaseStore`] guarded by a single async mutex.

// crates.io
use async_lock::Mutex as AsyncMutex;
// self
use crate::{
	_prelude::*,
	lease::Lease,
	store::{self, CriticalSection, LeaseStore, StoreError, StoreFuture},
};

type LeaseSlot = Arc<Mutex<Option<Lease>>>;

/// Thread-safe lease store that serializes refreshes within one process.
///
/// The lease slot has its own short-lived lock so `clear` can run without the critical section.
#[derive(Clone, Debug, Default)]
pub struct MemoryLeaseStore {
	section: Arc<AsyncMutex<()>>,
	slot: LeaseSlot,
}
impl MemoryLeaseStore {
	/// Returns the cached lease regardless of expiry.
	pub fn snapshot(&self) -> Option<Lease> {
		self.slot.lock().clone()
	}

	fn read_now(slot: &LeaseSlot, now: OffsetDateTime) -> Result<Lease, StoreError> {
		match slot.lock().as_ref() {
			None => Err(StoreError::NotPresent),
			Some(lease) if lease.is_expired_at(now) => Err(StoreError::Expired),
			Some(lease) => Ok(lease.clone()),
		}
	}
}
impl LeaseStore for MemoryLeaseStore {
	fn acquire(&self, timeout: Duration) -> StoreFuture<'_, CriticalSection> {
		let section = self.section.clone();

		Box::pin(async move {
			if let Some(guard) = section.try_lock_arc() {
				return Ok(CriticalSection::local(guard));
			}

			tokio::time::timeout(store::std_duration(timeout), section.lock_arc())
				.await
				.map(CriticalSection::local)
				.map_err(|_| StoreError::LockTimeout)
		})
	}

	fn release<'a>(&'a self, section: &'a mut CriticalSection) -> StoreFuture<'a, ()> {
		Box::pin(async move { section.surrender() })
	}

	fn read(&self, now: OffsetDateTime) -> StoreFuture<'_, Lease> {
		let slot = self.slot.clone();

		Box::pin(async move { Self::read_now(&slot, now) })
	}

	fn write(&self, lease: Lease, _now: OffsetDateTime) -> StoreFuture<'_, ()> {
		let slot = self.slot.clone();

		Box::pin(async move {
			*slot.lock() = Some(lease);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.lock().take();

			Ok(())
		})
	}
}
