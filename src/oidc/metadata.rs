//! Provider discovery document.

// self
use crate::_prelude::*;

/// Subset of the OpenID Provider Metadata the client relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Issuer identifier; must match the configured issuer.
	pub issuer: String,
	/// Authorization endpoint used by the code flows.
	pub authorization_endpoint: Url,
	/// Token endpoint used by every grant and refresh.
	pub token_endpoint: Url,
	/// JSON Web Key Set location.
	pub jwks_uri: Url,
	/// Device authorization endpoint (RFC 8628), when supported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device_authorization_endpoint: Option<Url>,
	/// PKCE methods the provider accepts.
	#[serde(default)]
	pub code_challenge_methods_supported: Vec<String>,
}
impl ProviderMetadata {
	/// Discovery document location for `issuer`.
	pub fn discovery_url(issuer: &str) -> Result<Url, url::ParseError> {
		Url::parse(&format!(
			"{}/.well-known/openid-configuration",
			issuer.trim_end_matches('/')
		))
	}

	/// Whether the document's issuer matches `configured`, ignoring a trailing slash.
	pub fn issuer_matches(&self, configured: &str) -> bool {
		self.issuer.trim_end_matches('/') == configured.trim_end_matches('/')
	}
}
