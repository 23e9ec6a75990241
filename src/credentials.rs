//! Issuer credentials for the `account_credentials` grant.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// Immutable account + client credentials presented to the token issuer.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuerCredentials {
	account_id: String,
	client_id: String,
	client_secret: String,
}
impl IssuerCredentials {
	/// Creates credentials for the provided account and client pair.
	pub fn new(
		account_id: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			account_id: account_id.into(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
		}
	}

	/// Account identifier sent as the grant context.
	pub fn account_id(&self) -> &str {
		&self.account_id
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// `Authorization` header value: `Basic base64(client_id:client_secret)`.
	pub fn basic_authorization(&self) -> String {
		let raw = format!("{}:{}", self.client_id, self.client_secret);

		format!("Basic {}", STANDARD.encode(raw))
	}
}
impl Debug for IssuerCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuerCredentials")
			.field("account_id", &self.account_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}
