//! Crate-level error types shared by the coordinator, stores, and transports.

// self
use crate::{_prelude::*, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by [`Coordinator`](crate::coordinator::Coordinator) operations.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The critical section could not be acquired (lock timed out or its backend is down).
	///
	/// Recoverable; retry the whole request later.
	#[error("Token refresh is unavailable: {0}")]
	RefreshUnavailable(#[source] StoreError),
	/// The issuer refused the credentials; usually a misconfiguration.
	#[error("Token issuer rejected the credentials with HTTP status {status}.")]
	IssuerRejected {
		/// HTTP status returned by the token endpoint.
		status: u16,
	},
	/// Talking to the issuer failed (network, decode, malformed lifetime).
	#[error(transparent)]
	RefreshFailed(#[from] RefreshError),
	/// Lease storage failed while reading, writing, or clearing.
	#[error("Lease storage failed.")]
	Storage(#[source] StoreError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` when retrying the request later may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RefreshUnavailable(_) | Self::RefreshFailed(_) | Self::Storage(_))
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::LockTimeout | StoreError::LockUnavailable { .. } =>
				Self::RefreshUnavailable(e),
			other => Self::Storage(other),
		}
	}
}

/// Failures raised while exchanging credentials with the issuer.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific error.
		#[source]
		source: BoxError,
	},
	/// Token endpoint responded with JSON that could not be decoded.
	#[error("Token endpoint returned malformed JSON.")]
	Decode {
		/// Structured parsing failure pointing at the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint declared a non-positive or out-of-range `expires_in`.
	#[error("Token endpoint declared an unusable lifetime of {expires_in} seconds.")]
	InvalidLifetime {
		/// Raw `expires_in` value.
		expires_in: i64,
	},
	/// The token request could not be assembled.
	#[error(transparent)]
	Request(#[from] oauth2::http::Error),
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}

/// Configuration failures raised while building a coordinator.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint URL is unusable.
	#[error("Token endpoint `{endpoint}` cannot carry query parameters.")]
	InvalidEndpoint {
		/// Offending endpoint.
		endpoint: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
