//! Request signing contracts that attach leased bearer tokens to arbitrary HTTP clients.

// std
#[cfg(feature = "reqwest")] use std::convert::Infallible;
// self
use crate::lease::AccessToken;

/// Describes how to attach an [`AccessToken`] to an outbound request without constraining the
/// HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects the bearer token.
	fn attach_token(&self, request: Request, token: &AccessToken) -> Result<Request, Error>;
}

/// Signs reqwest requests with an `Authorization: Bearer` header.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder, Infallible> for BearerSigner {
	fn attach_token(
		&self,
		request: reqwest::RequestBuilder,
		token: &AccessToken,
	) -> Result<reqwest::RequestBuilder, Infallible> {
		Ok(request.bearer_auth(token.expose()))
	}
}
