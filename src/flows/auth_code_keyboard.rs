//! Authorization code grant where the operator pastes the code into the terminal.

// self
use crate::{
	_prelude::*,
	flows::{
		GrantOutput,
		common::{self, AuthorizationAttempt},
	},
	interaction::Prompt,
	oidc::{CodeExchange, OidcClient},
};

/// Out-of-band redirect URI understood by most providers.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Inputs of the keyboard authorization code grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthCodeKeyboardOption {
	/// Redirect URI registered for the out-of-band flow.
	pub redirect_url: String,
	/// Extra authorization request parameters.
	pub auth_request_extra_params: Vec<(String, String)>,
}
impl Default for AuthCodeKeyboardOption {
	fn default() -> Self {
		Self { redirect_url: OOB_REDIRECT_URI.into(), auth_request_extra_params: Vec::new() }
	}
}

/// Prints the authorization URL, reads the code, and exchanges it.
pub async fn run(
	cancel: &CancellationToken,
	option: &AuthCodeKeyboardOption,
	client: &dyn OidcClient,
	prompt: &dyn Prompt,
) -> Result<GrantOutput> {
	let attempt = AuthorizationAttempt::generate(client)?;
	let url =
		attempt.authorization_url(client, &option.redirect_url, &option.auth_request_extra_params);

	tracing::info!("Open {url} in a browser, then paste the authorization code.");

	let code = common::cancellable(cancel, prompt.read_line("Enter code: ")).await?;
	let token_set = common::cancellable(
		cancel,
		client.exchange_authorization_code(CodeExchange {
			code: code.trim(),
			redirect_uri: &option.redirect_url,
			pkce: &attempt.pkce,
		}),
	)
	.await
	.map_err(Error::authorization)?;

	Ok(GrantOutput { token_set, nonce: Some(attempt.nonce) })
}
