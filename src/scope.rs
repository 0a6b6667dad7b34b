//! Scopes requested from the provider.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Scope every OIDC request carries.
pub const OPENID: &str = "openid";

/// Rejected scope values.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// `--oidc-extra-scope` was given an empty value.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// A single entry holds several space-separated scopes.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// `openid` plus the extra scopes, deduplicated and sorted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeSet(Vec<String>);
impl ScopeSet {
	/// Builds the requested scope set from the operator's extra scopes.
	pub fn openid_with<I, S>(extra: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = BTreeSet::from([OPENID.to_owned()]);

		for scope in extra {
			let scope = scope.into();

			if scope.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if scope.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope });
			}

			set.insert(scope);
		}

		Ok(Self(set.into_iter().collect()))
	}

	/// Iterator over the scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-delimited form sent in `scope` parameters.
	pub fn normalized(&self) -> String {
		self.0.join(" ")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn openid_is_always_requested_once() {
		let scopes = ScopeSet::openid_with(["email", "openid", "profile", "email"])
			.expect("Extra scopes should be valid.");

		assert_eq!(scopes.normalized(), "email openid profile");
		assert_eq!(
			ScopeSet::openid_with(Vec::<String>::new()).map(|scopes| scopes.normalized()),
			Ok(OPENID.to_owned())
		);
	}

	#[test]
	fn malformed_extra_scopes_are_rejected() {
		assert_eq!(ScopeSet::openid_with([""]), Err(ScopeValidationError::Empty));
		assert!(matches!(
			ScopeSet::openid_with(["email profile"]),
			Err(ScopeValidationError::ContainsWhitespace { .. })
		));
	}
}
