//! Proof Key for Code Exchange (RFC 7636) parameters.
//!
//! A fresh [`Params`] is generated for every authorization-code attempt and dropped after the
//! token exchange. The verifier never leaves this module except through
//! [`Params::token_request_option`], and its `Debug` output is redacted.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const VERIFIER_ENTROPY_BYTES: usize = 32;

/// Code challenge method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Method {
	/// PKCE disabled.
	#[default]
	None,
	/// SHA-256 challenge.
	S256,
}
impl Method {
	/// Picks `S256` when the provider advertises it, otherwise disables PKCE.
	pub fn negotiate<S>(supported: &[S]) -> Self
	where
		S: AsRef<str>,
	{
		if supported.iter().any(|m| m.as_ref() == "S256") { Self::S256 } else { Self::None }
	}

	/// Returns the RFC 7636 identifier, if any.
	pub const fn as_str(self) -> Option<&'static str> {
		match self {
			Self::None => None,
			Self::S256 => Some("S256"),
		}
	}
}

/// One-shot verifier bound to a single authorization request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Params {
	method: Method,
	verifier: String,
}
impl Params {
	/// Generates parameters for `method`.
	///
	/// Fails only when the operating system entropy source is unavailable.
	pub fn new(method: Method) -> Result<Self> {
		match method {
			Method::None => Ok(Self::default()),
			Method::S256 => {
				let mut bytes = [0_u8; VERIFIER_ENTROPY_BYTES];

				OsRng
					.try_fill_bytes(&mut bytes)
					.map_err(|e| Error::Entropy { reason: e.to_string() })?;

				Ok(Self { method, verifier: URL_SAFE_NO_PAD.encode(bytes) })
			},
		}
	}

	/// Selected challenge method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Secret verifier; empty when PKCE is disabled.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Derived `code_challenge`, when PKCE is enabled.
	pub fn challenge(&self) -> Option<String> {
		self.method.as_str()?;

		let digest = Sha256::digest(self.verifier.as_bytes());

		Some(URL_SAFE_NO_PAD.encode(digest))
	}

	/// Authorization request parameters (`code_challenge` and `code_challenge_method`).
	pub fn auth_code_option(&self) -> Option<[(&'static str, String); 2]> {
		let method = self.method.as_str()?;
		let challenge = self.challenge()?;

		Some([("code_challenge", challenge), ("code_challenge_method", method.to_owned())])
	}

	/// Token request parameter carrying the verifier.
	pub fn token_request_option(&self) -> Option<(&'static str, &str)> {
		if self.verifier.is_empty() {
			return None;
		}

		Some(("code_verifier", &self.verifier))
	}
}
impl Debug for Params {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Params")
			.field("method", &self.method)
			.field("verifier", &"<redacted>")
			.finish()
	}
}
