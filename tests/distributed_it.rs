mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use common::{TOKEN_PATH, token_body};
use token_lease::{
	coordinator::ReqwestCoordinator,
	error::Error,
	lease::{AccessToken, Lease},
	store::{DistributedLeaseStore, LeaseStore, LockRetryPolicy, MemoryKv, StoreError},
};

fn fast_retry() -> LockRetryPolicy {
	LockRetryPolicy {
		step: Duration::milliseconds(20),
		max_attempts: 50,
		lock_ttl: Duration::seconds(10),
	}
}

/// One "process": its own store handle and coordinator, sharing only the backend.
fn build_process(
	kv: &MemoryKv,
	retry: LockRetryPolicy,
	endpoint: &str,
) -> (ReqwestCoordinator, Arc<DistributedLeaseStore<MemoryKv>>) {
	let store =
		Arc::new(DistributedLeaseStore::<MemoryKv>::new(kv.clone()).with_retry_policy(retry));
	let coordinator = common::build_coordinator(store.clone(), endpoint);

	(coordinator, store)
}

#[tokio::test]
async fn processes_sharing_a_backend_refresh_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("shared-token", 3600));
		})
		.await;
	let kv = MemoryKv::default();
	let (first, first_store) = build_process(&kv, fast_retry(), &server.url(TOKEN_PATH));
	let (second, _second_store) = build_process(&kv, fast_retry(), &server.url(TOKEN_PATH));
	let (a, b) = tokio::join!(first.obtain(), second.obtain());

	assert_eq!(a.expect("First process should obtain a token.").expose(), "shared-token");
	assert_eq!(b.expect("Second process should obtain a token.").expose(), "shared-token");

	mock.assert_calls_async(1).await;

	assert!(kv.contains(first_store.data_key()));
	assert!(!kv.contains(first_store.lock_key()));
	assert_eq!(first.metrics().refreshes() + second.metrics().refreshes(), 1);
}

#[tokio::test]
async fn cancelled_refresh_frees_the_lock_for_other_processes() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(300))
				.body(token_body("late-token", 3600));
		})
		.await;
	let kv = MemoryKv::default();
	let (first, first_store) = build_process(&kv, fast_retry(), &server.url(TOKEN_PATH));
	let (second, _second_store) = build_process(&kv, fast_retry(), &server.url(TOKEN_PATH));
	let cancelled =
		tokio::time::timeout(std::time::Duration::from_millis(100), first.obtain()).await;

	assert!(cancelled.is_err(), "Caller should give up while the issuer is still responding.");

	// Let the scheduled compare-and-delete run.
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;

	assert!(!kv.contains(first_store.lock_key()));

	let token = second.obtain().await.expect("Lock should be free after the cancellation.");

	assert_eq!(token.expose(), "late-token");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn lease_written_by_one_process_is_served_to_another() {
	let kv = MemoryKv::default();
	let now = OffsetDateTime::now_utc();
	let (_writer, writer_store) = build_process(&kv, fast_retry(), "http://127.0.0.1:9/token");
	let (reader, _reader_store) = build_process(&kv, fast_retry(), "http://127.0.0.1:9/token");
	let lease = Lease::issued(
		AccessToken::new("seeded-token"),
		now + Duration::seconds(3600),
		Duration::seconds(60),
	);

	writer_store.write(lease.clone(), now).await.expect("Seeding the shared lease should succeed.");

	let served = reader.obtain_at(now).await.expect("Seeded lease should be served from cache.");

	assert_eq!(served, lease);
	assert_eq!(reader.metrics().cache_hits(), 1);
}

#[tokio::test]
async fn exhausted_retries_fail_as_refresh_unavailable() {
	let kv = MemoryKv::default();
	let retry = LockRetryPolicy {
		step: Duration::milliseconds(10),
		max_attempts: 3,
		lock_ttl: Duration::seconds(10),
	};
	let (_holder, holder_store) = build_process(&kv, retry, "http://127.0.0.1:9/token");
	let (waiter, _waiter_store) = build_process(&kv, retry, "http://127.0.0.1:9/token");
	let mut section = holder_store
		.acquire(Duration::seconds(1))
		.await
		.expect("First process should take the lock.");
	let err = waiter.obtain().await.expect_err("Lock held elsewhere should exhaust retries.");

	assert!(matches!(err, Error::RefreshUnavailable(StoreError::LockTimeout)));

	holder_store.release(&mut section).await.expect("Holder should release its own lock.");

	assert!(!kv.contains(holder_store.lock_key()));
}
