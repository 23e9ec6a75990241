// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for coordinator activity.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
	obtains: AtomicU64,
	cache_hits: AtomicU64,
	refreshes: AtomicU64,
	failures: AtomicU64,
	invalidations: AtomicU64,
	release_conflicts: AtomicU64,
}
impl CoordinatorMetrics {
	/// Returns the total number of `obtain` calls.
	pub fn obtains(&self) -> u64 {
		self.obtains.load(Ordering::Relaxed)
	}

	/// Returns the number of `obtain` calls served from the cached lease.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of successful upstream refreshes.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed `obtain` calls.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of explicit invalidations.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	/// Returns the number of releases that reported a conflict.
	pub fn release_conflicts(&self) -> u64 {
		self.release_conflicts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_obtain(&self) {
		self.obtains.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_release_conflict(&self) {
		self.release_conflicts.fetch_add(1, Ordering::Relaxed);
	}
}
