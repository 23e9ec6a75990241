//! Distributed [`LeaseStore`] built on a shared [`KvBackend`].
//!
//! Two keys are involved: the lock key holds the current holder identity with a short TTL, and
//! the data key holds the serialized [`Lease`] with a TTL matching the lease's own deadline. A
//! crashed holder is recovered solely by the lock key expiring; there is no renewal.

// self
use crate::{
	_prelude::*,
	lease::Lease,
	store::{self, CriticalSection, KvBackend, LeaseStore, StoreError, StoreFuture},
};

/// Default data key for the cached lease.
pub const DEFAULT_DATA_KEY: &str = "zoom_access_token";
/// Default lock key guarding refreshes.
pub const DEFAULT_LOCK_KEY: &str = "zoom_access_token_lock";

/// Bounded linear retry policy for obtaining the distributed lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockRetryPolicy {
	/// Fixed delay between attempts.
	pub step: Duration,
	/// Total number of attempts, including the first.
	pub max_attempts: u32,
	/// Lifetime of the lock key; must exceed the worst-case refresh latency.
	pub lock_ttl: Duration,
}
impl LockRetryPolicy {
	/// Worst-case time spent waiting between attempts.
	pub fn max_wait(&self) -> Duration {
		self.step * self.max_attempts.saturating_sub(1)
	}
}
impl Default for LockRetryPolicy {
	fn default() -> Self {
		Self {
			step: Duration::milliseconds(500),
			max_attempts: 6,
			lock_ttl: Duration::seconds(10),
		}
	}
}

/// Lease store shared by every process pointed at the same backend and keys.
pub struct DistributedLeaseStore<B>
where
	B: KvBackend,
{
	backend: Arc<B>,
	data_key: String,
	lock_key: String,
	retry: LockRetryPolicy,
}
impl<B> DistributedLeaseStore<B>
where
	B: KvBackend,
{
	/// Creates a store on `backend` using the default keys and retry policy.
	pub fn new(backend: impl Into<Arc<B>>) -> Self {
		Self {
			backend: backend.into(),
			data_key: DEFAULT_DATA_KEY.into(),
			lock_key: DEFAULT_LOCK_KEY.into(),
			retry: LockRetryPolicy::default(),
		}
	}

	/// Overrides the data key; the lock key becomes `<key>_lock`.
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		let key = key.into();

		if !key.is_empty() {
			self.lock_key = format!("{key}_lock");
			self.data_key = key;
		}

		self
	}

	/// Overrides the lock key independently of the data key.
	pub fn with_lock_key(mut self, key: impl Into<String>) -> Self {
		self.lock_key = key.into();

		self
	}

	/// Overrides the lock retry policy.
	pub fn with_retry_policy(mut self, retry: LockRetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Data key holding the serialized lease.
	pub fn data_key(&self) -> &str {
		&self.data_key
	}

	/// Lock key guarding refreshes.
	pub fn lock_key(&self) -> &str {
		&self.lock_key
	}

	/// Backend shared by this store.
	pub fn backend(&self) -> &Arc<B> {
		&self.backend
	}

	async fn acquire_now(&self, timeout: Duration) -> Result<CriticalSection, StoreError> {
		let holder = store::random_holder();
		let deadline = OffsetDateTime::now_utc() + timeout.max(Duration::ZERO);
		let attempts = self.retry.max_attempts.max(1);

		for attempt in 1..=attempts {
			if self
				.backend
				.set_if_absent(&self.lock_key, &holder, self.retry.lock_ttl)
				.await
				.map_err(into_lock_unavailable)?
			{
				return Ok(CriticalSection::remote(holder).on_abandon(self.abandon_hook()));
			}

			let remaining = deadline - OffsetDateTime::now_utc();

			if attempt == attempts || remaining <= Duration::ZERO {
				break;
			}

			tokio::time::sleep(store::std_duration(self.retry.step.min(remaining))).await;
		}

		Err(StoreError::LockTimeout)
	}

	/// Schedules the compare-and-delete on the current runtime when a held section is dropped.
	///
	/// Without a runtime the lock key is left to expire on its own TTL.
	fn abandon_hook(&self) -> impl 'static + FnOnce(String) + Send + Sync {
		let backend = Arc::clone(&self.backend);
		let lock_key = self.lock_key.clone();

		move |holder| {
			let Ok(runtime) = tokio::runtime::Handle::try_current() else {
				return;
			};

			runtime.spawn(async move {
				if let Err(err) = backend.delete_if_equals(&lock_key, &holder).await {
					crate::obs::Event::ReleaseConflict { error: &err }.emit();
				}
			});
		}
	}

	async fn release_now(&self, section: &mut CriticalSection) -> Result<(), StoreError> {
		if !section.is_held() {
			return Err(StoreError::NotHeld);
		}

		// Stays held until the delete settles so a cancelled release still runs the drop hook.
		let deleted = self.backend.delete_if_equals(&self.lock_key, section.holder()).await?;

		section.surrender()?;

		if deleted {
			Ok(())
		} else {
			// The lock expired under us and may now belong to someone else.
			Err(StoreError::NotHeld)
		}
	}

	async fn read_now(&self, now: OffsetDateTime) -> Result<Lease, StoreError> {
		let raw = self.backend.get(&self.data_key).await?.ok_or(StoreError::NotPresent)?;
		let lease: Lease = serde_json::from_str(&raw).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse cached lease: {e}"),
		})?;

		if lease.is_expired_at(now) {
			return Err(StoreError::Expired);
		}

		Ok(lease)
	}

	async fn write_now(&self, lease: Lease, now: OffsetDateTime) -> Result<(), StoreError> {
		let ttl = lease.remaining_at(now);

		// A zero TTL must never reach the backend; some stores read it as "no expiry".
		if ttl <= Duration::ZERO {
			return self.backend.delete(&self.data_key).await;
		}

		let payload = serde_json::to_string(&lease).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize lease: {e}"),
		})?;

		self.backend.set_with_ttl(&self.data_key, &payload, ttl).await
	}
}
impl<B> Clone for DistributedLeaseStore<B>
where
	B: KvBackend,
{
	fn clone(&self) -> Self {
		Self {
			backend: Arc::clone(&self.backend),
			data_key: self.data_key.clone(),
			lock_key: self.lock_key.clone(),
			retry: self.retry,
		}
	}
}
impl<B> Debug for DistributedLeaseStore<B>
where
	B: KvBackend,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DistributedLeaseStore")
			.field("data_key", &self.data_key)
			.field("lock_key", &self.lock_key)
			.field("retry", &self.retry)
			.finish()
	}
}
impl<B> LeaseStore for DistributedLeaseStore<B>
where
	B: KvBackend,
{
	fn acquire(&self, timeout: Duration) -> StoreFuture<'_, CriticalSection> {
		Box::pin(self.acquire_now(timeout))
	}

	fn release<'a>(&'a self, section: &'a mut CriticalSection) -> StoreFuture<'a, ()> {
		Box::pin(self.release_now(section))
	}

	fn read(&self, now: OffsetDateTime) -> StoreFuture<'_, Lease> {
		Box::pin(self.read_now(now))
	}

	fn write(&self, lease: Lease, now: OffsetDateTime) -> StoreFuture<'_, ()> {
		Box::pin(self.write_now(lease, now))
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(self.backend.delete(&self.data_key))
	}
}

fn into_lock_unavailable(err: StoreError) -> StoreError {
	match err {
		StoreError::Backend { message } => StoreError::LockUnavailable { message },
		other => other,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{lease::AccessToken, store::MemoryKv};

	fn fast_policy() -> LockRetryPolicy {
		LockRetryPolicy {
			step: Duration::milliseconds(10),
			max_attempts: 3,
			lock_ttl: Duration::seconds(5),
		}
	}

	fn store_on(kv: &MemoryKv) -> DistributedLeaseStore<MemoryKv> {
		DistributedLeaseStore::<MemoryKv>::new(kv.clone()).with_retry_policy(fast_policy())
	}

	#[test]
	fn default_policy_bounds_the_wait() {
		let policy = LockRetryPolicy::default();

		assert_eq!(policy.max_wait(), Duration::milliseconds(2500));
		assert!(policy.lock_ttl > Duration::seconds(5));
	}

	#[test]
	fn custom_key_derives_lock_key() {
		let store = DistributedLeaseStore::<MemoryKv>::new(MemoryKv::default()).with_key("tenant_token");

		assert_eq!(store.data_key(), "tenant_token");
		assert_eq!(store.lock_key(), "tenant_token_lock");

		let store = DistributedLeaseStore::<MemoryKv>::new(MemoryKv::default()).with_key("");

		assert_eq!(store.data_key(), DEFAULT_DATA_KEY);
		assert_eq!(store.lock_key(), DEFAULT_LOCK_KEY);
	}

	#[tokio::test]
	async fn contention_past_budget_times_out() {
		let kv = MemoryKv::default();
		let a = store_on(&kv);
		let b = store_on(&kv);
		let mut held = a.acquire(Duration::seconds(1)).await.expect("First acquire should succeed.");

		assert_eq!(b.acquire(Duration::seconds(1)).await.map(|_| ()), Err(StoreError::LockTimeout));

		a.release(&mut held).await.expect("Release should succeed.");

		let mut next = b.acquire(Duration::seconds(1)).await.expect("Lock should be free again.");

		b.release(&mut next).await.expect("Release should succeed.");
		assert!(!kv.contains(DEFAULT_LOCK_KEY));
	}

	#[tokio::test]
	async fn waiter_obtains_lock_once_holder_releases() {
		let kv = MemoryKv::default();
		let a = store_on(&kv);
		let b = DistributedLeaseStore::<MemoryKv>::new(kv.clone()).with_retry_policy(LockRetryPolicy {
			max_attempts: 50,
			..fast_policy()
		});
		let mut held = a.acquire(Duration::seconds(1)).await.expect("First acquire should succeed.");
		let waiter = tokio::spawn(async move { b.acquire(Duration::seconds(2)).await });

		tokio::time::sleep(std::time::Duration::from_millis(30)).await;
		a.release(&mut held).await.expect("Release should succeed.");

		let section = waiter
			.await
			.expect("Waiter task should not panic.")
			.expect("Waiter should obtain the lock after release.");

		assert!(section.is_held());
	}

	#[tokio::test]
	async fn dropped_section_releases_the_lock_key() {
		let kv = MemoryKv::default();
		let a = store_on(&kv);
		let b = store_on(&kv);

		drop(a.acquire(Duration::seconds(1)).await.expect("Acquire should succeed."));
		tokio::time::sleep(std::time::Duration::from_millis(20)).await;

		assert!(!kv.contains(DEFAULT_LOCK_KEY));

		let mut next = b.acquire(Duration::seconds(1)).await.expect("Lock should be free again.");

		b.release(&mut next).await.expect("Release should succeed.");
	}

	#[tokio::test]
	async fn release_after_lock_expiry_reports_not_held() {
		let kv = MemoryKv::default();
		let a = DistributedLeaseStore::<MemoryKv>::new(kv.clone()).with_retry_policy(LockRetryPolicy {
			lock_ttl: Duration::milliseconds(20),
			..fast_policy()
		});
		let b = store_on(&kv);
		let mut stale = a.acquire(Duration::seconds(1)).await.expect("Acquire should succeed.");

		tokio::time::sleep(std::time::Duration::from_millis(40)).await;

		let mut current = b.acquire(Duration::seconds(1)).await.expect("Expired lock should be free.");

		assert_eq!(a.release(&mut stale).await, Err(StoreError::NotHeld));
		assert!(kv.contains(DEFAULT_LOCK_KEY), "Stale release must not delete the new holder's lock.");
		assert_eq!(b.release(&mut current).await, Ok(()));
		assert_eq!(b.release(&mut current).await, Err(StoreError::NotHeld));
	}

	#[tokio::test]
	async fn write_sets_ttl_and_read_round_trips() {
		let kv = MemoryKv::default();
		let store = store_on(&kv);
		let now = OffsetDateTime::now_utc();
		let lease = Lease::new(AccessToken::new("shared"), now + Duration::minutes(5));

		assert_eq!(store.read(now).await, Err(StoreError::NotPresent));

		store.write(lease.clone(), now).await.expect("Write should succeed.");

		assert_eq!(store.read(now).await, Ok(lease));

		let ttl = kv.ttl(DEFAULT_DATA_KEY).expect("Data key should carry a TTL.");

		assert!(ttl > Duration::minutes(4) && ttl <= Duration::minutes(5));

		store.clear().await.expect("Clear should succeed.");
		store.clear().await.expect("Clearing twice should succeed.");

		assert_eq!(store.read(now).await, Err(StoreError::NotPresent));
	}

	#[tokio::test]
	async fn non_positive_ttl_clears_instead_of_writing() {
		let kv = MemoryKv::default();
		let store = store_on(&kv);
		let now = OffsetDateTime::now_utc();

		store
			.write(Lease::new(AccessToken::new("live"), now + Duration::minutes(5)), now)
			.await
			.expect("Write should succeed.");
		store
			.write(Lease::new(AccessToken::new("dead"), now - Duration::seconds(1)), now)
			.await
			.expect("Expired write should degrade to a clear.");

		assert!(!kv.contains(DEFAULT_DATA_KEY));
		assert_eq!(store.read(now).await, Err(StoreError::NotPresent));
	}

	#[tokio::test]
	async fn corrupt_payload_is_a_serialization_error() {
		let kv = MemoryKv::default();
		let store = store_on(&kv);

		kv.set_with_ttl(DEFAULT_DATA_KEY, "not-json", Duration::minutes(1))
			.await
			.expect("Raw write should succeed.");

		assert!(matches!(
			store.read(OffsetDateTime::now_utc()).await,
			Err(StoreError::Serialization { .. })
		));
	}
}
