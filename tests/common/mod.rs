//! Fixtures shared by the integration suites.
//!
//! Mirrors `token_lease::_preludet` so the suites also run without `--features test`.

// std
use std::sync::Arc;
// self
use token_lease::{
	coordinator::ReqwestCoordinator,
	credentials::IssuerCredentials,
	http::ReqwestHttpClient,
	reqwest::Client,
	store::LeaseStore,
	url::Url,
};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const ACCOUNT_ID: &str = "account-it";
pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";

/// Reqwest transport that accepts the self-signed certificate served by `httpmock`.
pub fn test_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Coordinator caching into `store` and refreshing against `token_endpoint`.
pub fn build_coordinator(store: Arc<dyn LeaseStore>, token_endpoint: &str) -> ReqwestCoordinator {
	let endpoint =
		Url::parse(token_endpoint).expect("Mock token endpoint should parse successfully.");

	ReqwestCoordinator::with_http_client(
		store,
		IssuerCredentials::new(ACCOUNT_ID, CLIENT_ID, CLIENT_SECRET),
		test_http_client(),
	)
	.with_token_endpoint(endpoint)
}

/// Issuer JSON body declaring `expires_in` seconds for `token`.
pub fn token_body(token: &str, expires_in: i64) -> String {
	format!("{{\"access_token\":\"{token}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in}}}")
}
