//! Credential coordinator: the single place that decides whether to reuse or refresh the lease.
//!
//! [`Coordinator::obtain`] runs acquire -> read -> (refresh -> write) -> release. Concurrent
//! callers queue on the store's critical section and re-check the lease once they hold it, so a
//! burst of cache misses collapses into exactly one issuer call per expiry cycle. Every exit path
//! releases the section, and a caller cancelled while holding it releases through the handle's
//! drop.

mod issuer;
mod metrics;

pub use metrics::CoordinatorMetrics;

// self
use crate::{
	_prelude::*,
	credentials::IssuerCredentials,
	error::ConfigError,
	http::TokenHttpClient,
	lease::{AccessToken, DEFAULT_SAFETY_MARGIN, Lease},
	obs::{Event, OpKind, OpOutcome, OpSpan},
	store::{CriticalSection, LeaseStore, StoreError},
};
#[cfg(feature = "reqwest")]
use crate::{
	ext::{BearerSigner, RequestSignerExt},
	http::{DEFAULT_ISSUER_TIMEOUT, ReqwestHttpClient},
};

/// Token endpoint used unless [`Coordinator::with_token_endpoint`] overrides it.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://zoom.us/oauth/token";
/// Longest a caller waits for the critical section before failing fast.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::seconds(10);

const UNAUTHORIZED: u16 = 401;

#[cfg(feature = "reqwest")]
/// Coordinator specialized for the crate's default reqwest transport.
pub type ReqwestCoordinator = Coordinator<ReqwestHttpClient>;

/// Hands out one shared, consistently expiring bearer token.
///
/// Credentials, store, endpoint, margin, and lock timeout are fixed at construction.
#[derive(Clone)]
pub struct Coordinator<C>
where
	C: ?Sized + TokenHttpClient,
{
	http_client: Arc<C>,
	store: Arc<dyn LeaseStore>,
	credentials: IssuerCredentials,
	token_endpoint: Option<Url>,
	safety_margin: Duration,
	lock_timeout: Duration,
	metrics: Arc<CoordinatorMetrics>,
}
impl<C> Coordinator<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Creates a coordinator that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn LeaseStore>,
		credentials: IssuerCredentials,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			credentials,
			token_endpoint: None,
			safety_margin: DEFAULT_SAFETY_MARGIN,
			lock_timeout: DEFAULT_LOCK_TIMEOUT,
			metrics: Default::default(),
		}
	}

	/// Overrides the issuer's token endpoint.
	pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
		self.token_endpoint = Some(endpoint);

		self
	}

	/// Overrides the margin subtracted from issuer-declared lifetimes (negative values clamp to
	/// zero).
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin.max(Duration::ZERO);

		self
	}

	/// Overrides how long `obtain` waits for the critical section.
	pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
		self.lock_timeout = timeout.max(Duration::ZERO);

		self
	}

	/// Issuer credentials this coordinator presents.
	pub fn credentials(&self) -> &IssuerCredentials {
		&self.credentials
	}

	/// Margin subtracted from issuer-declared lifetimes.
	pub fn safety_margin(&self) -> Duration {
		self.safety_margin
	}

	/// Counters describing coordinator activity.
	pub fn metrics(&self) -> &CoordinatorMetrics {
		&self.metrics
	}

	/// Returns a valid bearer token, refreshing it from the issuer only on a genuine cache miss.
	///
	/// Expiry is judged against the clock read once the critical section is held, so time spent
	/// queueing behind another refresh never lets an expired lease through.
	pub async fn obtain(&self) -> Result<AccessToken> {
		self.obtain_with_clock(None).await.map(|lease| lease.token)
	}

	/// Same as [`obtain`](Self::obtain), evaluating expiry at `now` and returning the whole lease.
	pub async fn obtain_at(&self, now: OffsetDateTime) -> Result<Lease> {
		self.obtain_with_clock(Some(now)).await
	}

	/// Clears the cached lease so the next `obtain` goes to the issuer.
	///
	/// Takes no lock: clearing only removes state and is safe to race with a refresh.
	pub async fn invalidate(&self) -> Result<()> {
		let op = OpSpan::enter(OpKind::Invalidate, "invalidate");
		let result = op.instrument(self.store.clear()).await.map_err(Error::Storage);

		if result.is_ok() {
			self.metrics.record_invalidation();
		}

		op.finish(&result);

		result
	}

	/// Feeds back an upstream response status; a 401 invalidates the lease.
	///
	/// Returns whether the lease was invalidated.
	pub async fn observe_status(&self, status: u16) -> Result<bool> {
		if status != UNAUTHORIZED {
			return Ok(false);
		}

		self.invalidate().await?;

		Ok(true)
	}

	async fn obtain_with_clock(&self, at: Option<OffsetDateTime>) -> Result<Lease> {
		let op = OpSpan::enter(OpKind::Obtain, "obtain");

		self.metrics.record_obtain();

		let result = op
			.instrument(async {
				let mut section =
					self.store.acquire(self.lock_timeout).await.map_err(Error::RefreshUnavailable)?;
				let now = at.unwrap_or_else(OffsetDateTime::now_utc);
				let result = self.obtain_locked(&op, now).await;

				self.release(&mut section).await;

				result
			})
			.await;

		if result.is_err() {
			self.metrics.record_failure();
			op.record(OpOutcome::Failure);
		}

		result
	}

	async fn obtain_locked(&self, op: &OpSpan, now: OffsetDateTime) -> Result<Lease> {
		match self.store.read(now).await {
			Ok(lease) => {
				Event::CacheHit { expires_at: lease.expires_at }.emit();
				op.record(OpOutcome::CacheHit);
				self.metrics.record_cache_hit();

				return Ok(lease);
			},
			// A payload nobody can parse is overwritten by the refresh below.
			Err(reason)
				if reason.is_cache_miss()
					|| matches!(reason, StoreError::Serialization { .. }) =>
				Event::CacheMiss { reason: &reason }.emit(),
			Err(other) => return Err(Error::Storage(other)),
		}

		let lease = self.refresh(now).await?;

		self.store.write(lease.clone(), now).await.map_err(Error::Storage)?;
		Event::Refreshed { expires_at: lease.expires_at }.emit();
		op.record(OpOutcome::Success);

		Ok(lease)
	}

	async fn refresh(&self, now: OffsetDateTime) -> Result<Lease> {
		let op = OpSpan::enter(OpKind::Refresh, "issuer_exchange");
		let result = op
			.instrument(async {
				let endpoint = self.token_endpoint()?;

				issuer::exchange(
					self.http_client.as_ref(),
					&endpoint,
					&self.credentials,
					now,
					self.safety_margin,
				)
				.await
			})
			.await;

		if result.is_ok() {
			self.metrics.record_refresh();
		}

		op.finish(&result);

		result
	}

	async fn release(&self, section: &mut CriticalSection) {
		if let Err(error) = self.store.release(section).await {
			self.metrics.record_release_conflict();
			Event::ReleaseConflict { error: &error }.emit();
		}
	}

	fn token_endpoint(&self) -> Result<Url> {
		match &self.token_endpoint {
			Some(endpoint) => Ok(endpoint.clone()),
			None => Url::parse(DEFAULT_TOKEN_ENDPOINT).map_err(|_| {
				ConfigError::InvalidEndpoint { endpoint: DEFAULT_TOKEN_ENDPOINT.into() }.into()
			}),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Coordinator<ReqwestHttpClient> {
	/// Creates a coordinator with its own reqwest transport bounded by
	/// [`DEFAULT_ISSUER_TIMEOUT`].
	pub fn new(store: Arc<dyn LeaseStore>, credentials: IssuerCredentials) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(DEFAULT_ISSUER_TIMEOUT)?;

		Ok(Self::with_http_client(store, credentials, http_client))
	}
}
#[cfg(feature = "reqwest")]
impl<C> Coordinator<C>
where
	C: ?Sized + TokenHttpClient,
{
	/// Attaches a valid bearer token to an outbound reqwest request.
	pub async fn authorize(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<reqwest::RequestBuilder> {
		let token = self.obtain().await?;
		let Ok(request) = BearerSigner.attach_token(request, &token);

		Ok(request)
	}
}
impl<C> Debug for Coordinator<C>
where
	C: ?Sized + TokenHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("credentials", &self.credentials)
			.field("token_endpoint", &self.token_endpoint)
			.field("safety_margin", &self.safety_margin)
			.field("lock_timeout", &self.lock_timeout)
			.finish()
	}
}
