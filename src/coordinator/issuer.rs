//! `account_credentials` exchange against the token issuer.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest,
	http::{
		Method, StatusCode,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	credentials::IssuerCredentials,
	error::{ConfigError, RefreshError},
	http::TokenHttpClient,
	lease::{AccessToken, Lease},
};

const GRANT_TYPE: &str = "account_credentials";

/// JSON body returned by the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct IssuerResponse {
	pub(crate) access_token: String,
	#[serde(default)]
	#[allow(dead_code)]
	pub(crate) token_type: Option<String>,
	pub(crate) expires_in: i64,
	#[serde(default)]
	#[allow(dead_code)]
	pub(crate) scope: Option<String>,
}
impl IssuerResponse {
	pub(crate) fn parse(body: &[u8]) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| RefreshError::Decode { source }.into())
	}

	/// Converts the response into a lease observed at `now`.
	pub(crate) fn into_lease(self, now: OffsetDateTime, safety_margin: Duration) -> Result<Lease> {
		let lifetime = Duration::seconds(self.expires_in);

		if self.expires_in <= 0 || now.checked_add(lifetime).is_none() {
			return Err(RefreshError::InvalidLifetime { expires_in: self.expires_in }.into());
		}

		Ok(Lease::from_lifetime(AccessToken::new(self.access_token), now, lifetime, safety_margin))
	}
}

/// Builds the token request: grant context in the query, client pair as basic auth.
pub(crate) fn build_request(
	endpoint: &Url,
	credentials: &IssuerCredentials,
) -> Result<HttpRequest> {
	if !matches!(endpoint.scheme(), "http" | "https") {
		return Err(ConfigError::InvalidEndpoint { endpoint: endpoint.to_string() }.into());
	}

	let mut url = endpoint.clone();

	url.query_pairs_mut()
		.append_pair("grant_type", GRANT_TYPE)
		.append_pair("account_id", credentials.account_id());

	oauth2::http::Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(AUTHORIZATION, credentials.basic_authorization())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(|e| RefreshError::from(e).into())
}

/// Performs one exchange and returns the safety-margined lease.
pub(crate) async fn exchange<C>(
	http_client: &C,
	endpoint: &Url,
	credentials: &IssuerCredentials,
	now: OffsetDateTime,
	safety_margin: Duration,
) -> Result<Lease>
where
	C: ?Sized + TokenHttpClient,
{
	let request = build_request(endpoint, credentials)?;
	let handle = http_client.handle();
	let response = handle.call(request).await.map_err(RefreshError::transport)?;

	if response.status() != StatusCode::OK {
		return Err(Error::IssuerRejected { status: response.status().as_u16() });
	}

	IssuerResponse::parse(response.body())?.into_lease(now, safety_margin)
}
