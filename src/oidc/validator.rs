//! ID token verification against the provider's published keys.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Validation, decode, decode_header,
	errors::ErrorKind,
	jwk::{Jwk, JwkSet},
};
// self
use crate::{_prelude::*, clock::Clock, error::ValidationError, oidc::IdTokenClaims};

/// Checks signature, issuer, audience, expiry, and nonce of ID tokens.
///
/// Failures are never retried: they mean a misconfiguration or a forged token.
#[derive(Clone)]
pub struct IdTokenValidator {
	issuer: String,
	audience: String,
	clock: Arc<dyn Clock>,
}
impl IdTokenValidator {
	/// Creates a validator expecting `issuer` and an `aud` that contains `audience`.
	pub fn new(
		issuer: impl Into<String>,
		audience: impl Into<String>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { issuer: issuer.into(), audience: audience.into(), clock }
	}

	/// Verifies `id_token` and returns its claims.
	pub fn validate(
		&self,
		id_token: &str,
		keys: &JwkSet,
		expected_nonce: Option<&str>,
	) -> Result<IdTokenClaims, ValidationError> {
		let header = decode_header(id_token)
			.map_err(|e| ValidationError::Malformed { reason: e.to_string() })?;

		if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
			return Err(ValidationError::UnsupportedAlgorithm {
				algorithm: format!("{:?}", header.alg),
			});
		}

		let jwk = select_key(keys, header.kid.as_deref())
			.ok_or_else(|| ValidationError::UnknownKey { kid: header.kid.clone() })?;
		let key = DecodingKey::from_jwk(jwk)
			.map_err(|e| ValidationError::Malformed { reason: format!("unusable JWK: {e}") })?;
		let mut validation = Validation::new(header.alg);

		// Expiry is compared against the injected clock below.
		validation.validate_exp = false;
		validation.set_required_spec_claims(&["exp", "iss", "aud"]);
		validation.set_issuer(&[self.issuer.as_str(), self.issuer.trim_end_matches('/')]);
		validation.set_audience(&[self.audience.as_str()]);

		let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
			.map_err(|e| self.map_decode_error(e))?
			.claims;
		let expired_at = claims.expiry()?;

		if expired_at <= self.clock.now() {
			return Err(ValidationError::Expired { expired_at });
		}
		if expected_nonce.is_some_and(|expected| claims.nonce.as_deref() != Some(expected)) {
			return Err(ValidationError::NonceMismatch);
		}

		Ok(claims)
	}

	fn map_decode_error(&self, err: jsonwebtoken::errors::Error) -> ValidationError {
		match err.kind() {
			ErrorKind::InvalidIssuer =>
				return ValidationError::IssuerMismatch { expected: self.issuer.clone() },
			ErrorKind::InvalidAudience =>
				return ValidationError::AudienceMismatch { expected: self.audience.clone() },
			_ => (),
		}

		let signature = matches!(
			err.kind(),
			ErrorKind::InvalidSignature
				| ErrorKind::InvalidAlgorithm
				| ErrorKind::InvalidRsaKey(_)
				| ErrorKind::InvalidEcdsaKey
		);

		if signature {
			ValidationError::Signature { source: err }
		} else {
			ValidationError::Malformed { reason: err.to_string() }
		}
	}
}
impl Debug for IdTokenValidator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdTokenValidator")
			.field("issuer", &self.issuer)
			.field("audience", &self.audience)
			.finish()
	}
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
	match kid {
		Some(kid) => keys.find(kid),
		None if keys.keys.len() == 1 => keys.keys.first(),
		None => None,
	}
}
