//! Crate-wide error taxonomy shared by grant flows, the OIDC client, and the token cache.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token cache failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem detected before any I/O.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// ID token or authorization response failed validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Provider rejected the grant (bad code, refresh token, or credentials).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Provider answered with an OAuth error outside the well-known classes.
	#[error("Provider returned {code}: {description}.")]
	Provider {
		/// OAuth `error` code.
		code: String,
		/// OAuth `error_description`, or the code when absent.
		description: String,
	},
	/// Discovery of the provider metadata failed; fatal for the invocation.
	#[error("Discovery failed for issuer {issuer}: {reason}.")]
	Discovery {
		/// Configured issuer URL.
		issuer: String,
		/// What went wrong.
		reason: String,
	},
	/// A grant strategy failed; wraps the underlying cause.
	#[error("authorization error: {0}")]
	Authorization(#[source] Box<Error>),
	/// Disk cleanup failed for the given cache directory.
	#[error("Failed to delete the token cache from {directory}: {source}")]
	Cleanup {
		/// Cache directory that could not be cleaned.
		directory: String,
		/// Underlying store failure.
		#[source]
		source: crate::store::StoreError,
	},
	/// The operating system entropy source failed.
	#[error("Secure random source is unavailable: {reason}.")]
	Entropy {
		/// Underlying failure text.
		reason: String,
	},
	/// The invocation was cancelled or timed out.
	#[error("Operation was cancelled before it completed.")]
	Cancelled,
}
impl Error {
	/// Wraps a grant-strategy failure with the `authorization error` context.
	pub fn authorization(err: Error) -> Self {
		match err {
			Self::Cancelled => Self::Cancelled,
			other => Self::Authorization(Box::new(other)),
		}
	}
}

/// Configuration and validation failures raised before any network call.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A requested scope is malformed.
	#[error(transparent)]
	InvalidScope(#[from] crate::scope::ScopeValidationError),
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Issuer URL cannot be parsed.
	#[error("Issuer URL `{issuer}` is invalid.")]
	InvalidIssuer {
		/// Offending issuer value.
		issuer: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A discovered endpoint cannot be used by the OAuth client.
	#[error("The {endpoint} endpoint is invalid.")]
	InvalidEndpoint {
		/// Which endpoint failed.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI `{uri}` is invalid.")]
	InvalidRedirect {
		/// Offending redirect URI.
		uri: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// TLS material could not be loaded.
	#[error("Failed to load TLS material from {origin}: {reason}.")]
	TlsMaterial {
		/// File path or `certificate-authority-data`.
		origin: String,
		/// Underlying failure text.
		reason: String,
	},

	/// No grant option was populated.
	#[error("No grant option is set; choose exactly one grant type.")]
	NoGrantOption,
	/// More than one grant option was populated.
	#[error("Multiple grant options are set ({}); choose exactly one grant type.", grants.join(", "))]
	MultipleGrantOptions {
		/// Labels of the populated options.
		grants: Vec<&'static str>,
	},
	/// A grant strategy was invoked without its input.
	#[error("nil input for the {grant} grant.")]
	MissingGrantInput {
		/// Grant label.
		grant: &'static str,
	},
	/// Token cache storage kind is not recognized.
	#[error("Unknown token cache storage `{value}`; expected `disk` or `keyring`.")]
	UnknownStorage {
		/// Offending value.
		value: String,
	},
	/// Grant type flag is not recognized.
	#[error("Unknown grant type `{value}`.")]
	UnknownGrantType {
		/// Offending value.
		value: String,
	},
	/// Client authentication API version is not recognized.
	#[error("unknown apiVersion: {value}")]
	UnknownApiVersion {
		/// Offending value.
		value: String,
	},
	/// `KUBERNETES_EXEC_INFO` could not be parsed.
	#[error("KUBERNETES_EXEC_INFO is invalid: {reason}.")]
	InvalidExecInfo {
		/// Parser failure text.
		reason: String,
	},
	/// Provider does not advertise a device authorization endpoint.
	#[error("Provider metadata does not advertise a device_authorization_endpoint.")]
	MissingDeviceEndpoint,
	/// Every listen address failed to bind.
	#[error("Could not bind any local address ({}).", addresses.join(", "))]
	NoBindableAddress {
		/// Addresses that were attempted.
		addresses: Vec<String>,
	},
	/// Operator extra parameter is malformed.
	#[error("Extra parameter `{value}` must be in KEY=VALUE form.")]
	InvalidExtraParam {
		/// Offending value.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Provider returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider responded with JSON that could not be parsed.
	#[error("Provider returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure.
	#[error("I/O error occurred while talking to the provider or the browser.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures that indicate a configuration or identity mismatch; never retried.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// Token is not a well-formed JWT.
	#[error("ID token is malformed: {reason}.")]
	Malformed {
		/// Parser failure text.
		reason: String,
	},
	/// Token response carried no `id_token`.
	#[error("Token response from the {grant} grant did not include an id_token.")]
	MissingIdToken {
		/// Grant that produced the response.
		grant: &'static str,
	},
	/// No published key matches the token header.
	#[error("No signing key matches the ID token (kid: {}).", kid.as_deref().unwrap_or("<none>"))]
	UnknownKey {
		/// `kid` from the token header.
		kid: Option<String>,
	},
	/// Token was signed with an algorithm the validator refuses.
	#[error("ID token uses the unsupported algorithm {algorithm}.")]
	UnsupportedAlgorithm {
		/// Header algorithm label.
		algorithm: String,
	},
	/// Signature verification failed.
	#[error("ID token signature is invalid.")]
	Signature {
		/// Verification failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// `iss` does not match the configured issuer.
	#[error("ID token issuer does not match {expected}.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
	},
	/// `aud` does not contain the configured client.
	#[error("ID token audience does not contain {expected}.")]
	AudienceMismatch {
		/// Expected audience entry.
		expected: String,
	},
	/// `exp` is not in the future.
	#[error("ID token expired at {expired_at}.")]
	Expired {
		/// Expiry instant from the token.
		expired_at: OffsetDateTime,
	},
	/// `nonce` differs from the one sent in the authorization request.
	#[error("ID token nonce does not match the authorization request.")]
	NonceMismatch,
	/// `state` differs from the one sent in the authorization request.
	#[error("Authorization state mismatch; the redirect may be forged.")]
	StateMismatch,
	/// Redirect carried the expected `state` but no `code`.
	#[error("Authorization redirect did not include a code.")]
	MissingAuthorizationCode,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn authorization_wrapper_keeps_source() {
		let err = Error::authorization(Error::InvalidClient { reason: "bad secret".into() });

		assert!(err.to_string().starts_with("authorization error: "));
		assert!(err.to_string().contains("bad secret"));

		let source = StdError::source(&err).expect("Wrapped error should expose its source.");

		assert!(source.to_string().contains("bad secret"));
	}

	#[test]
	fn authorization_wrapper_passes_cancellation_through() {
		assert!(matches!(Error::authorization(Error::Cancelled), Error::Cancelled));
	}

	#[test]
	fn config_messages_name_offending_values() {
		let err = ConfigError::UnknownApiVersion { value: "invalid/v999".into() };

		assert!(err.to_string().contains("unknown apiVersion"));
		assert!(err.to_string().contains("invalid/v999"));

		let err = ConfigError::MultipleGrantOptions { grants: vec!["password", "device_code"] };

		assert!(err.to_string().contains("password, device_code"));
	}
}
