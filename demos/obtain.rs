//! Demonstrates obtaining a shared token through both lease store variants against a mock
//! issuer: an in-process store for tasks in one process, and a distributed store whose two
//! "processes" share one key-value backend.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use token_lease::{
	coordinator::ReqwestCoordinator,
	credentials::IssuerCredentials,
	http::ReqwestHttpClient,
	reqwest::Client,
	store::{DistributedLeaseStore, LeaseStore, MemoryKv, MemoryLeaseStore},
	url::Url,
};

fn coordinator(store: Arc<dyn LeaseStore>, endpoint: &Url) -> Result<ReqwestCoordinator> {
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);

	Ok(ReqwestCoordinator::with_http_client(
		store,
		IssuerCredentials::new("demo-account", "demo-client", "super-secret"),
		http_client,
	)
	.with_token_endpoint(endpoint.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").query_param("grant_type", "account_credentials");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let endpoint = Url::parse(&server.url("/oauth/token"))?;

	// In-process: concurrent callers share one refresh.
	let local = coordinator(Arc::new(MemoryLeaseStore::default()), &endpoint)?;
	let (first, second) = tokio::join!(local.obtain(), local.obtain());

	println!("In-process tokens: {} and {}.", first?.expose(), second?.expose());

	// Distributed: two coordinators over one backend, as two processes would be over Redis.
	let kv = MemoryKv::default();
	let process_a =
		coordinator(Arc::new(DistributedLeaseStore::<MemoryKv>::new(kv.clone())), &endpoint)?;
	let process_b = coordinator(Arc::new(DistributedLeaseStore::<MemoryKv>::new(kv)), &endpoint)?;
	let (a, b) = tokio::join!(process_a.obtain(), process_b.obtain());

	println!("Distributed tokens: {} and {}.", a?.expose(), b?.expose());

	// One refresh per store.
	token_mock.assert_calls_async(2).await;

	Ok(())
}
