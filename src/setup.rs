//! `setup` use case: authenticate once without the cache and print kubeconfig instructions.

// std
use std::io::Write;
// self
use crate::{
	_prelude::*,
	authentication::{Authentication, Input},
	error::TransportError,
	oidc::IdTokenClaims,
};

/// Input of [`Setup::run`].
#[derive(Clone, Debug, Default)]
pub struct SetupInput {
	/// Orchestrator input; its cache configuration is ignored.
	pub authentication: Input,
	/// Flags the operator passed, reproduced as `get-token` arguments.
	pub changed_flags: Vec<String>,
}

/// Verifies a provider configuration interactively.
#[derive(Clone, Debug)]
pub struct Setup {
	authentication: Authentication,
}
impl Setup {
	/// Creates the use case.
	pub fn new(authentication: Authentication) -> Self {
		Self { authentication }
	}

	/// Authenticates and writes the claims plus the `kubectl config` command to `out`.
	pub async fn run(
		&self,
		cancel: &CancellationToken,
		input: SetupInput,
		mut out: impl Write,
	) -> Result<()> {
		let mut authentication = input.authentication;

		authentication.cache = None;

		let output = self.authentication.run(cancel, authentication).await?;
		let instructions = render_instructions(&output.claims, &input.changed_flags);

		out.write_all(instructions.as_bytes()).map_err(TransportError::from)?;

		Ok(())
	}
}

/// Renders the setup report.
pub fn render_instructions(claims: &IdTokenClaims, changed_flags: &[String]) -> String {
	let claims =
		serde_json::to_string_pretty(claims).unwrap_or_else(|e| format!("<unprintable: {e}>"));
	let mut command = String::from(
		"kubectl config set-credentials oidc \\\n  \
		 --exec-api-version=client.authentication.k8s.io/v1 \\\n  \
		 --exec-interactive-mode=IfAvailable \\\n  \
		 --exec-command=kubectl \\\n  \
		 --exec-arg=oidc-login \\\n  \
		 --exec-arg=get-token",
	);

	for flag in changed_flags {
		command.push_str(" \\\n  --exec-arg=");
		command.push_str(&shell_quote(flag));
	}

	format!(
		"## Authenticated with the OpenID Connect Provider\n\n\
		 You got the token with the following claims:\n\n\
		 {claims}\n\n\
		 ## Set up the kubeconfig\n\n\
		 {command}\n\n\
		 ## Verify cluster access\n\n\
		 kubectl --user=oidc cluster-info\n"
	)
}

fn shell_quote(value: &str) -> String {
	let plain = value
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '.' | '/' | ':' | ','));

	if plain { value.to_owned() } else { format!("'{}'", value.replace('\'', r"'\''")) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::oidc::Audience;

	#[test]
	fn instructions_reproduce_changed_flags() {
		let claims = IdTokenClaims {
			iss: "https://issuer.example.com".into(),
			sub: Some("YOUR_SUBJECT".into()),
			aud: Audience::Single("YOUR_CLIENT_ID".into()),
			exp: 1_700_000_000,
			iat: None,
			nonce: None,
			extra: BTreeMap::new(),
		};
		let report = render_instructions(
			&claims,
			&[
				"--oidc-issuer-url=https://accounts.google.com".into(),
				"--oidc-extra-scope=email profile".into(),
			],
		);

		assert!(report.contains("\"sub\": \"YOUR_SUBJECT\""));
		assert!(report.contains("--exec-arg=--oidc-issuer-url=https://accounts.google.com"));
		assert!(report.contains("--exec-arg='--oidc-extra-scope=email profile'"));
		assert!(report.contains("kubectl --user=oidc cluster-info"));
	}

	#[test]
	fn shell_quote_escapes_single_quotes() {
		assert_eq!(shell_quote("a'b"), r"'a'\''b'");
		assert_eq!(shell_quote("--grant-type=authcode"), "--grant-type=authcode");
	}
}
