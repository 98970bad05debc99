// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per flow attempt and once per terminal outcome.
pub const FLOW_TOTAL: &str = "openbanking_broker_flow_total";
/// Histogram of completed flow durations, in seconds.
pub const FLOW_DURATION: &str = "openbanking_broker_flow_duration_seconds";

/// Increments [`FLOW_TOTAL`] labeled by `flow` and `outcome` (no-op without `metrics`).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long a finished flow took in [`FLOW_DURATION`], labeled by `flow` and `outcome`.
pub fn record_flow_duration(kind: FlowKind, outcome: FlowOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(FLOW_DURATION, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome, elapsed);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_recorder_is_harmless() {
		record_flow_outcome(FlowKind::ResourceToken, FlowOutcome::Failure);
		record_flow_duration(FlowKind::Callback, FlowOutcome::Success, StdDuration::from_millis(12));
	}
}
