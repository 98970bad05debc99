//! Optional observability helpers for broker flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit `openbanking_broker.flow` spans carrying the flow kind, the call
//!   site (`stage`), and the final `outcome`, plus `warn` events for swallowed failures.
//! - Enable `metrics` to increment the `openbanking_broker_flow_total` counter for every
//!   attempt and outcome, and to record `openbanking_broker_flow_duration_seconds`, both
//!   labeled by `flow` and `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// `client_credentials` grant.
	ClientCredentials,
	/// `refresh_token` grant.
	Refresh,
	/// `authorization_code` grant.
	AuthorizationCode,
	/// Resource-token lookup (cache, consent, refresh-or-revoke).
	ResourceToken,
	/// Consent creation and authorization request.
	CreateConsent,
	/// Consent status fetch.
	GetConsent,
	/// Bank redirect callback processing.
	Callback,
	/// Account information calls.
	Accounts,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::Refresh => "refresh",
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::ResourceToken => "resource_token",
			FlowKind::CreateConsent => "create_consent",
			FlowKind::GetConsent => "get_consent",
			FlowKind::Callback => "callback",
			FlowKind::Accounts => "accounts",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`], recording the attempt, its outcome, and its duration.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);
	let started = Instant::now();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	span.record_outcome(outcome);
	record_flow_outcome(kind, outcome);
	record_flow_duration(kind, outcome, started.elapsed());

	result
}

/// Converts a non-critical step's result into an option, logging the failure.
pub(crate) fn best_effort<T, E>(kind: FlowKind, stage: &'static str, result: Result<T, E>) -> Option<T>
where
	E: Display,
{
	match result {
		Ok(value) => Some(value),
		Err(e) => {
			#[cfg(feature = "tracing")]
			::tracing::warn!(
				flow = kind.as_str(),
				stage,
				error = %e,
				"Best-effort step failed; continuing."
			);
			#[cfg(not(feature = "tracing"))]
			let _ = (kind, stage, e);

			None
		},
	}
}
