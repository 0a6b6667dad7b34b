//! Classification of provider error responses into the crate taxonomy.
//!
//! Structured OAuth fields win, then body text hints, then the HTTP status. Only the
//! well-known codes get dedicated variants; everything else keeps the provider's code and
//! description verbatim.

// self
use crate::{_prelude::*, error::TransientError};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Canonical provider error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (bad code, refresh token, or credentials).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Failure is temporary.
	Transient,
	/// Any other OAuth error.
	Other,
}

/// Primitive facts about a failed provider call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Token endpoint status, if a response arrived.
	pub http_status: Option<u16>,
	/// `error` code from the error response.
	pub oauth_error: Option<String>,
	/// `error_description` from the error response.
	pub error_description: Option<String>,
	/// Truncated body of a non-JSON error response.
	pub body_preview: Option<String>,
	/// Retry-After hint, if any.
	pub retry_after: Option<Duration>,
}
impl ProviderErrorContext {
	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: Option<u16>) -> Self {
		self.http_status = status;

		self
	}

	/// Adds the OAuth error code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Sets `error_description`.
	pub fn with_error_description(mut self, description: Option<String>) -> Self {
		self.error_description = description;

		self
	}

	/// Keeps the start of a non-JSON error body.
	pub fn with_body_preview(mut self, body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);

		self.body_preview = Some(truncate_preview(&text));

		self
	}

	/// Adds a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Classifies the failure.
	pub fn classify(&self) -> ProviderErrorKind {
		if let Some(kind) = self.oauth_error.as_deref().and_then(match_exact_value) {
			return kind;
		}
		if self.oauth_error.is_some() {
			return ProviderErrorKind::Other;
		}
		if let Some(kind) = classify_body(self.body_preview.as_deref()) {
			return kind;
		}

		classify_status(self.http_status)
	}

	/// Converts the failure into an [`Error`] for `operation` (for example `token`).
	pub fn into_error(self, operation: &str) -> Error {
		let code = self
			.oauth_error
			.clone()
			.or_else(|| self.http_status.map(|status| format!("http_{status}")))
			.unwrap_or_else(|| "unknown_error".into());
		let description = self
			.error_description
			.clone()
			.or_else(|| self.body_preview.clone().filter(|body| !body.is_empty()))
			.unwrap_or_else(|| code.clone());
		let reason = format!("{operation} endpoint returned {code}: {description}");

		match self.classify() {
			ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason },
			ProviderErrorKind::InvalidClient => Error::InvalidClient { reason },
			ProviderErrorKind::Transient => TransientError::Endpoint {
				message: reason,
				status: self.http_status,
				retry_after: self.retry_after,
			}
			.into(),
			ProviderErrorKind::Other => Error::Provider { code, description },
		}
	}
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.trim().to_owned();
	}

	let mut buf: String = body.chars().take(BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant")
		|| value.eq_ignore_ascii_case("access_denied")
		|| value.eq_ignore_ascii_case("expired_token")
	{
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(ProviderErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("temporarily_unavailable") => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		_ => ProviderErrorKind::Other,
	}
}
