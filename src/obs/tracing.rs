// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Span wrapping one flow run. `stage` names the call site.
pub fn flow_span(kind: FlowKind, stage: &'static str) -> Span {
	tracing::info_span!("kube_oidc_login.flow", flow = kind.as_str(), stage)
}

/// Attaches the flow span to `fut` so no guard is held across `.await`.
pub fn in_flow_span<Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Instrumented<Fut>
where
	Fut: Future,
{
	fut.instrument(flow_span(kind, stage))
}

/// Logs a failed flow inside its span.
pub fn trace_failure(kind: FlowKind, error: &Error) {
	tracing::debug!(flow = kind.as_str(), %error, "Flow failed.");
}
