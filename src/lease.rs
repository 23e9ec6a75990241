//! Cached credential lease and the redacted bearer token it carries.

// self
use crate::_prelude::*;

/// Safety margin subtracted from issuer-declared lifetimes unless configured otherwise.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::seconds(60);

/// Redacted bearer token wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the value for an `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Cached bearer token plus the instant it stops being served.
///
/// `expires_at` already has the safety margin applied: a lease is treated as expired strictly
/// before the issuer invalidates the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
	/// Bearer token handed to the request layer.
	pub token: AccessToken,
	/// Safety-margined deadline.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl Lease {
	/// Creates a lease that expires at the provided (already margined) instant.
	pub fn new(token: AccessToken, expires_at: OffsetDateTime) -> Self {
		Self { token, expires_at }
	}

	/// Creates a lease from the issuer's own deadline, pulling it forward by `safety_margin`.
	pub fn issued(
		token: AccessToken,
		issuer_expires_at: OffsetDateTime,
		safety_margin: Duration,
	) -> Self {
		Self::new(token, issuer_expires_at - safety_margin.max(Duration::ZERO))
	}

	/// Creates a lease from an issuer-declared lifetime observed at `now`.
	pub fn from_lifetime(
		token: AccessToken,
		now: OffsetDateTime,
		declared_lifetime: Duration,
		safety_margin: Duration,
	) -> Self {
		Self::issued(token, now + declared_lifetime, safety_margin)
	}

	/// Returns `true` once `instant` reaches the margined deadline.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining lifetime at `instant`, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		(self.expires_at - instant).max(Duration::ZERO)
	}
}
