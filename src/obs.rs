//! Observability helpers shared by grant flows, refreshes, and cleanup.
//!
//! Every flow runs inside a `kube_oidc_login.flow` span carrying the `flow` (grant) and
//! `stage` (call site) fields. With the `metrics` feature enabled, the
//! `kube_oidc_login_flow_total` counter is incremented for every attempt/success/failure,
//! labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the plugin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code grant with a local redirect listener.
	AuthorizationCodeBrowser,
	/// Authorization code grant with the code typed on the terminal.
	AuthorizationCodeKeyboard,
	/// Resource owner password credentials grant.
	Password,
	/// Client credentials grant.
	ClientCredentials,
	/// Device authorization grant.
	DeviceCode,
	/// Refresh token grant.
	Refresh,
	/// Token cache cleanup.
	Clean,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCodeBrowser => "authcode",
			FlowKind::AuthorizationCodeKeyboard => "authcode_keyboard",
			FlowKind::Password => "password",
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::DeviceCode => "device_code",
			FlowKind::Refresh => "refresh",
			FlowKind::Clean => "clean",
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
	/// Entry to a flow.
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

/// Runs `fut` inside a flow span and records its attempt and outcome.
pub async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = in_flow_span(kind, stage, fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			flow_span(kind, stage).in_scope(|| trace_failure(kind, e));
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}
