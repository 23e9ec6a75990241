//! Spans, counters, and log events for coordinator operations.
//!
//! # Feature Flags
//!
//! - `tracing`: each operation runs inside a `token_lease.op` span carrying `op` and `stage`;
//!   cache decisions log at `debug`, refreshes at `info`, and release conflicts at `warn`.
//! - `metrics`: every recorded outcome increments `token_lease_op_total{op,outcome}`.
//!
//! With both features off every call here compiles down to nothing.

// self
use crate::{_prelude::*, store::StoreError};

/// Future returned by [`OpSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Coordinator operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Obtaining a valid token (cache hit or refresh).
	Obtain,
	/// Upstream exchange with the issuer.
	Refresh,
	/// Clearing the cached lease after an unauthorized response.
	Invalidate,
}
impl OpKind {
	/// Stable label used for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Obtain => "obtain",
			Self::Refresh => "refresh",
			Self::Invalidate => "invalidate",
		}
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a coordinator operation.
	Attempt,
	/// Served from the cached lease without touching the issuer.
	CacheHit,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Stable label used for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::CacheHit => "cache_hit",
			Self::Success => "success",
			Self::Failure => "failure",
		}
	}
}

/// One observed operation: its span plus the kind every recorded outcome is labeled with.
#[derive(Clone, Debug)]
pub struct OpSpan {
	kind: OpKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens the span for `kind` at `stage` and records the attempt.
	pub fn enter(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		let op = Self { kind, span: tracing::info_span!("token_lease.op", op = kind.as_str(), stage) };
		#[cfg(not(feature = "tracing"))]
		let op = {
			let _ = stage;

			Self { kind }
		};

		op.record(OpOutcome::Attempt);

		op
	}

	/// Operation kind this span labels outcomes with.
	pub fn kind(&self) -> OpKind {
		self.kind
	}

	/// Records `outcome` for this operation.
	pub fn record(&self, outcome: OpOutcome) {
		#[cfg(feature = "metrics")]
		{
			metrics::counter!(
				"token_lease_op_total",
				"op" => self.kind.as_str(),
				"outcome" => outcome.as_str()
			)
			.increment(1);
		}

		#[cfg(not(feature = "metrics"))]
		{
			let _ = outcome;
		}
	}

	/// Records success or failure from `result`.
	pub fn finish<T, E>(&self, result: &Result<T, E>) {
		self.record(if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });
	}

	/// Instruments `fut` without holding a span guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Noteworthy points inside an operation.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Event<'a> {
	CacheHit { expires_at: OffsetDateTime },
	CacheMiss { reason: &'a StoreError },
	Refreshed { expires_at: OffsetDateTime },
	ReleaseConflict { error: &'a StoreError },
}
impl Event<'_> {
	pub(crate) fn emit(self) {
		#[cfg(feature = "tracing")]
		{
			match self {
				Self::CacheHit { expires_at } => tracing::debug!(%expires_at, "serving cached lease"),
				Self::CacheMiss { reason } =>
					tracing::debug!(%reason, "cached lease unusable; refreshing"),
				Self::Refreshed { expires_at } => tracing::info!(%expires_at, "refreshed access token"),
				Self::ReleaseConflict { error } =>
					tracing::warn!(%error, "failed to release the refresh lock"),
			}
		}

		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;
		}
	}
}
