//! Resource owner password credentials grant.

// self
use crate::{
	_prelude::*,
	flows::{GrantOutput, common},
	interaction::Prompt,
	oidc::OidcClient,
};

/// Inputs of the password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordOption {
	/// Resource owner username; also scopes the cache entry.
	pub username: String,
	/// Password; prompted for with echo disabled when absent.
	pub password: Option<String>,
}
impl Debug for PasswordOption {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordOption")
			.field("username", &self.username)
			.field("password_set", &self.password.is_some())
			.finish()
	}
}

/// Exchanges the operator's credentials directly at the token endpoint.
pub async fn run(
	cancel: &CancellationToken,
	option: &PasswordOption,
	client: &dyn OidcClient,
	prompt: &dyn Prompt,
) -> Result<GrantOutput> {
	let password = match &option.password {
		Some(password) => password.clone(),
		None => common::cancellable(cancel, prompt.read_password("Password: ")).await?,
	};
	let token_set =
		common::cancellable(cancel, client.exchange_password(&option.username, &password))
			.await
			.map_err(Error::authorization)?;

	Ok(GrantOutput::without_nonce(token_set))
}
