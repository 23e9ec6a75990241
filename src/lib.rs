//! Single-flight access token leasing for server-to-server OAuth clients: one upstream refresh
//! per expiry cycle, whether callers are tasks in one process or processes sharing a store.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod ext;
pub mod http;
pub mod lease;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		coordinator::{Coordinator, ReqwestCoordinator},
		credentials::IssuerCredentials,
		http::ReqwestHttpClient,
		store::{LeaseStore, MemoryLeaseStore},
	};

	/// Account identifier shared by integration tests.
	pub const TEST_ACCOUNT_ID: &str = "account-test";
	/// Client identifier shared by integration tests.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret shared by integration tests.
	pub const TEST_CLIENT_SECRET: &str = "secret-test";

	/// Builds the issuer credentials used across integration tests.
	pub fn test_credentials() -> IssuerCredentials {
		IssuerCredentials::new(TEST_ACCOUNT_ID, TEST_CLIENT_ID, TEST_CLIENT_SECRET)
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a coordinator that talks to `token_endpoint` and caches into `store`.
	pub fn build_reqwest_test_coordinator(
		store: Arc<dyn LeaseStore>,
		token_endpoint: &str,
	) -> ReqwestCoordinator {
		let endpoint =
			Url::parse(token_endpoint).expect("Mock token endpoint should parse successfully.");

		Coordinator::with_http_client(store, test_credentials(), test_reqwest_http_client())
			.with_token_endpoint(endpoint)
	}

	/// Builds a coordinator backed by a fresh in-process store.
	pub fn build_memory_test_coordinator(
		token_endpoint: &str,
	) -> (ReqwestCoordinator, Arc<MemoryLeaseStore>) {
		let backend = Arc::new(MemoryLeaseStore::default());
		let store: Arc<dyn LeaseStore> = backend.clone();

		(build_reqwest_test_coordinator(store, token_endpoint), backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
