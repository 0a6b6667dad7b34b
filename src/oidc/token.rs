//! Token set returned by grants and refreshes, plus the ID token claim model.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, error::ValidationError};

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Tokens issued by one grant or refresh.
///
/// Serialized as the cache entry body; a write always replaces the whole set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// Signed ID token presented to the Kubernetes API server.
	pub id_token: TokenSecret,
	/// Access token issued alongside the ID token.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl TokenSet {
	/// Creates a set without a refresh token.
	pub fn new(id_token: impl Into<String>, access_token: impl Into<String>) -> Self {
		Self {
			id_token: TokenSecret::new(id_token),
			access_token: TokenSecret::new(access_token),
			refresh_token: None,
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Decodes the ID token claims without checking the signature.
	///
	/// Only used to read `exp` from tokens that were validated when they were stored.
	pub fn unverified_claims(&self) -> Result<IdTokenClaims, ValidationError> {
		decode_unverified(self.id_token.expose())
	}

	/// Whether the ID token expires before `now + skew`.
	///
	/// Tokens whose claims cannot be read count as expired.
	pub fn is_expired_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		match self.unverified_claims().and_then(|claims| claims.expiry()) {
			Ok(expiry) => expiry <= now + skew,
			Err(_) => true,
		}
	}
}

/// `aud` claim, which may be a single string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience.
	Single(String),
	/// Multiple audiences.
	Multiple(Vec<String>),
}
impl Audience {
	/// Whether `value` is one of the audiences.
	pub fn contains(&self, value: &str) -> bool {
		match self {
			Self::Single(aud) => aud == value,
			Self::Multiple(auds) => auds.iter().any(|aud| aud == value),
		}
	}
}

/// ID token claims consumed by validation and the setup report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer.
	pub iss: String,
	/// Subject.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sub: Option<String>,
	/// Audience.
	pub aud: Audience,
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Issued-at as seconds since the Unix epoch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iat: Option<i64>,
	/// Nonce echoed from the authorization request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	/// Every other claim, kept for display.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// `exp` as an instant.
	pub fn expiry(&self) -> Result<OffsetDateTime, ValidationError> {
		OffsetDateTime::from_unix_timestamp(self.exp)
			.map_err(|e| ValidationError::Malformed { reason: format!("exp is out of range: {e}") })
	}
}

fn decode_unverified(token: &str) -> Result<IdTokenClaims, ValidationError> {
	let mut parts = token.split('.');
	let (Some(_), Some(payload), Some(_), None) =
		(parts.next(), parts.next(), parts.next(), parts.next())
	else {
		return Err(ValidationError::Malformed { reason: "expected three segments".into() });
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|e| ValidationError::Malformed { reason: e.to_string() })?;

	serde_json::from_slice(&bytes).map_err(|e| ValidationError::Malformed { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn unsigned_token(claims: serde_json::Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.sig")
	}

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn expiry_honors_skew() {
		let token = unsigned_token(serde_json::json!({
			"iss": "https://issuer.example.com",
			"aud": ["kubernetes", "other"],
			"exp": 1_700_000_000,
			"email": "alice@example.com",
		}));
		let set = TokenSet::new(token, "access");
		let exp = OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.");
		let claims = set.unverified_claims().expect("Fixture claims should decode.");

		assert!(claims.aud.contains("kubernetes"));
		assert_eq!(claims.extra.get("email"), Some(&serde_json::json!("alice@example.com")));
		assert!(!set.is_expired_at(exp - Duration::minutes(5), Duration::minutes(1)));
		assert!(set.is_expired_at(exp - Duration::seconds(30), Duration::minutes(1)));
		assert!(set.is_expired_at(exp, Duration::ZERO));
	}

	#[test]
	fn opaque_tokens_count_as_expired() {
		let set = TokenSet::new("not-a-jwt", "access");

		assert!(matches!(set.unverified_claims(), Err(ValidationError::Malformed { .. })));
		assert!(set.is_expired_at(OffsetDateTime::UNIX_EPOCH, Duration::ZERO));
	}

	#[test]
	fn cache_body_omits_missing_refresh_token() {
		let json = serde_json::to_value(TokenSet::new("id", "access"))
			.expect("Token set should serialize.");

		assert_eq!(json, serde_json::json!({ "id_token": "id", "access_token": "access" }));
	}
}
