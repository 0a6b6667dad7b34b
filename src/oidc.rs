//! OpenID Connect client: provider configuration, token types, discovery, and validation.

pub mod classify;
pub mod client;
pub mod metadata;
pub mod token;
pub mod validator;

pub use client::*;
pub use metadata::ProviderMetadata;
pub use token::*;
pub use validator::IdTokenValidator;

// self
use crate::{_prelude::*, error::ConfigError, scope::ScopeSet};

/// Identity provider configuration supplied once per invocation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Provider {
	/// Issuer URL; discovery reads `{issuer}/.well-known/openid-configuration`.
	pub issuer_url: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	pub client_secret: Option<String>,
	/// Scopes requested in addition to `openid`.
	pub extra_scopes: Vec<String>,
	/// Audience requested from providers that mint tokens for a separate resource.
	pub audience: Option<String>,
}
impl Provider {
	/// Scopes sent on every authorization and token request.
	pub fn requested_scopes(&self) -> Result<ScopeSet> {
		ScopeSet::openid_with(self.extra_scopes.iter().cloned())
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl Debug for Provider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Provider")
			.field("issuer_url", &self.issuer_url)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("extra_scopes", &self.extra_scopes)
			.field("audience", &self.audience)
			.finish()
	}
}

/// OAuth grant types the client issues against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Resource owner password credentials.
	Password,
	/// Client credentials.
	ClientCredentials,
	/// Device authorization grant (RFC 8628).
	DeviceCode,
	/// Refresh token rotation.
	RefreshToken,
}
impl GrantType {
	/// Returns the `grant_type` form value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::Password => "password",
			GrantType::ClientCredentials => "client_credentials",
			GrantType::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn debug_hides_client_secret() {
		let provider = Provider {
			issuer_url: "https://issuer.example.com".into(),
			client_id: "kubernetes".into(),
			client_secret: Some("hunter2".into()),
			..Default::default()
		};
		let rendered = format!("{provider:?}");

		assert!(!rendered.contains("hunter2"));
		assert!(rendered.contains("client_secret_set: true"));
	}

	#[test]
	fn requested_scopes_include_openid() {
		let provider = Provider { extra_scopes: vec!["email".into()], ..Default::default() };
		let scopes = provider.requested_scopes().expect("Extra scopes should be valid.");

		assert_eq!(scopes.normalized(), "email openid");
	}
}
