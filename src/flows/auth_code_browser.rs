//! Authorization code grant driven through the system browser and a loopback redirect.

// self
use crate::{
	_prelude::*,
	flows::{
		GrantOutput,
		common::{self, AuthorizationAttempt},
		local_server::CallbackServer,
	},
	interaction::Browser,
	oidc::{CodeExchange, OidcClient},
};

/// Inputs of the browser-based authorization code grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthCodeBrowserOption {
	/// Local addresses tried in order for the redirect listener.
	pub listen_addresses: Vec<String>,
	/// Hostname placed in the redirect URI.
	pub redirect_url_hostname: String,
	/// Prints the URL without launching a browser.
	pub skip_open_browser: bool,
	/// Extra authorization request parameters.
	pub auth_request_extra_params: Vec<(String, String)>,
}
impl Default for AuthCodeBrowserOption {
	fn default() -> Self {
		Self {
			listen_addresses: vec!["127.0.0.1:8000".into(), "127.0.0.1:18000".into()],
			redirect_url_hostname: "localhost".into(),
			skip_open_browser: false,
			auth_request_extra_params: Vec::new(),
		}
	}
}

/// Runs the grant until the redirect arrives, the listener fails, or `cancel` fires.
pub async fn run(
	cancel: &CancellationToken,
	option: &AuthCodeBrowserOption,
	client: &dyn OidcClient,
	browser: &dyn Browser,
) -> Result<GrantOutput> {
	let attempt = AuthorizationAttempt::generate(client)?;
	let mut server = CallbackServer::start(&option.listen_addresses, &attempt.state).await?;
	let redirect_uri = format!("http://{}:{}", option.redirect_url_hostname, server.port());
	let url = attempt.authorization_url(client, &redirect_uri, &option.auth_request_extra_params);

	tracing::info!("Open {url} in a browser to authenticate.");

	if !option.skip_open_browser {
		common::open_browser(browser, &url);
	}

	let code = common::cancellable(cancel, server.wait()).await?;

	drop(server);

	let token_set = common::cancellable(
		cancel,
		client.exchange_authorization_code(CodeExchange {
			code: &code,
			redirect_uri: &redirect_uri,
			pkce: &attempt.pkce,
		}),
	)
	.await
	.map_err(Error::authorization)?;

	Ok(GrantOutput { token_set, nonce: Some(attempt.nonce) })
}
