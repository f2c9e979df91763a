// self
use crate::{_prelude::*, obs::CallStage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used around client calls.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided stage + route.
	pub fn new(stage: CallStage, route: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("authed_http.call", stage = stage.as_str(), route);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, route);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
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

/// Emits a `warn` event for a collaborator failure the client absorbs instead of surfacing.
pub fn log_swallowed(stage: CallStage, what: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(stage = stage.as_str(), error = %error, "{what}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, what, error);
	}
}

/// Emits a `debug` event describing how a failed response was dispatched.
pub fn log_disposition(stage: CallStage, route: &str, disposition: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(stage = stage.as_str(), route, disposition, "classified failed response");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, route, disposition);
	}
}
