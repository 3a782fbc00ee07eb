//! Optional observability hooks for token operations.
//!
//! # Feature Flags
//!
//! - `tracing` wraps every token operation in a span named `brokerage_oauth.token` carrying the
//!   `operation` and `stage` fields.
//! - `metrics` increments `brokerage_oauth_token_total`, labeled by `operation` and `outcome`, on
//!   every attempt, success, and failure.
//!
//! Without either feature the hooks compile down to nothing.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Token operations exposed by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOperation {
	/// Authorization code exchange.
	AcquireToken,
	/// Access token refresh without refresh-token rotation.
	RefreshAccess,
	/// Access token refresh that also rotates the refresh token.
	RefreshRefresh,
}
impl TokenOperation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOperation::AcquireToken => "acquire_token",
			TokenOperation::RefreshAccess => "refresh_access",
			TokenOperation::RefreshRefresh => "refresh_refresh",
		}
	}
}
impl Display for TokenOperation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOutcome {
	/// Operation was invoked.
	Attempt,
	/// Token endpoint returned a decodable grant.
	Success,
	/// Error propagated back to the caller.
	Failure,
}
impl TokenOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenOutcome::Attempt => "attempt",
			TokenOutcome::Success => "success",
			TokenOutcome::Failure => "failure",
		}
	}
}
impl Display for TokenOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
