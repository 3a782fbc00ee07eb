// self
use crate::{_prelude::*, obs::TokenOperation};

/// Future type produced by [`TokenSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedToken<F> = tracing::instrument::Instrumented<F>;
/// Future type produced by [`TokenSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedToken<F> = F;

/// Span wrapper used by token operations.
#[derive(Clone, Debug)]
pub struct TokenSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl TokenSpan {
	/// Creates a span tagged with the operation and a stage label.
	pub fn new(operation: TokenOperation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("brokerage_oauth.token", operation = operation.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Records a warning inside the span.
	pub fn warn(&self, message: &str) {
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(|| tracing::warn!("{message}"));
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = message;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedToken<Fut>
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

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = TokenSpan::new(TokenOperation::RefreshAccess, "instrument_passes_output_through");

		span.warn("smoke");

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
