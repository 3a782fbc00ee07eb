// self
use crate::obs::{TokenOperation, TokenOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_token_outcome(operation: TokenOperation, outcome: TokenOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"brokerage_oauth_token_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}
