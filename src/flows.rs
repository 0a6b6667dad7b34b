//! Grant strategies and the tagged union that selects exactly one of them.
//!
//! Every strategy shares the same shape: it receives the cancellation token, its own input,
//! the discovered [`OidcClient`], and the operator [`Interaction`] handles, and yields a
//! [`GrantOutput`]. Wire failures are wrapped with the `authorization error` context; state
//! mismatches and missing inputs pass through unwrapped so callers can tell them apart.

pub mod auth_code_browser;
pub mod auth_code_keyboard;
pub mod client_credentials;
pub mod common;
pub mod device_code;
pub mod password;

mod local_server;

pub use auth_code_browser::AuthCodeBrowserOption;
pub use auth_code_keyboard::AuthCodeKeyboardOption;
pub use device_code::DeviceCodeOption;
pub use password::PasswordOption;

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	interaction::{Browser, Prompt},
	obs::{self, FlowKind},
	oidc::{ClientCredentialsInput, OidcClient, TokenSet},
};

/// Operator-facing collaborators handed to interactive strategies.
#[derive(Clone)]
pub struct Interaction {
	/// Opens URLs.
	pub browser: Arc<dyn Browser>,
	/// Reads codes and passwords.
	pub prompt: Arc<dyn Prompt>,
}
impl Debug for Interaction {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Interaction(..)")
	}
}

/// Tokens produced by a strategy plus the nonce the ID token must echo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantOutput {
	/// Issued tokens.
	pub token_set: TokenSet,
	/// Nonce sent in the authorization request, if the strategy used one.
	pub nonce: Option<String>,
}
impl GrantOutput {
	/// Output of a strategy that sends no nonce.
	pub fn without_nonce(token_set: TokenSet) -> Self {
		Self { token_set, nonce: None }
	}
}

/// Operator-supplied grant options; exactly one field must be set.
#[derive(Clone, Debug, Default)]
pub struct GrantOptionSet {
	/// Authorization code grant with a local redirect listener.
	pub auth_code_browser: Option<AuthCodeBrowserOption>,
	/// Authorization code grant with the code typed on the terminal.
	pub auth_code_keyboard: Option<AuthCodeKeyboardOption>,
	/// Resource owner password credentials grant.
	pub password: Option<PasswordOption>,
	/// Client credentials grant.
	pub client_credentials: Option<ClientCredentialsInput>,
	/// Device authorization grant.
	pub device_code: Option<DeviceCodeOption>,
}
impl GrantOptionSet {
	/// Resolves the single populated option into a [`Grant`].
	pub fn into_grant(self) -> Result<Grant, ConfigError> {
		let Self { auth_code_browser, auth_code_keyboard, password, client_credentials, device_code } =
			self;
		let mut grants = Vec::new();

		if let Some(option) = auth_code_browser {
			grants.push(Grant::AuthCodeBrowser(option));
		}
		if let Some(option) = auth_code_keyboard {
			grants.push(Grant::AuthCodeKeyboard(option));
		}
		if let Some(option) = password {
			grants.push(Grant::Password(option));
		}
		if let Some(input) = client_credentials {
			grants.push(Grant::ClientCredentials(input));
		}
		if let Some(option) = device_code {
			grants.push(Grant::DeviceCode(option));
		}

		match grants.len() {
			0 => Err(ConfigError::NoGrantOption),
			1 => grants.pop().ok_or(ConfigError::NoGrantOption),
			_ => Err(ConfigError::MultipleGrantOptions {
				grants: grants.iter().map(Grant::label).collect(),
			}),
		}
	}
}

/// Exactly one selected grant strategy with its input.
#[derive(Clone, Debug)]
pub enum Grant {
	/// Authorization code grant with a local redirect listener.
	AuthCodeBrowser(AuthCodeBrowserOption),
	/// Authorization code grant with the code typed on the terminal.
	AuthCodeKeyboard(AuthCodeKeyboardOption),
	/// Resource owner password credentials grant.
	Password(PasswordOption),
	/// Client credentials grant.
	ClientCredentials(ClientCredentialsInput),
	/// Device authorization grant.
	DeviceCode(DeviceCodeOption),
}
impl Grant {
	/// Flow kind used for spans and metrics.
	pub const fn kind(&self) -> FlowKind {
		match self {
			Grant::AuthCodeBrowser(_) => FlowKind::AuthorizationCodeBrowser,
			Grant::AuthCodeKeyboard(_) => FlowKind::AuthorizationCodeKeyboard,
			Grant::Password(_) => FlowKind::Password,
			Grant::ClientCredentials(_) => FlowKind::ClientCredentials,
			Grant::DeviceCode(_) => FlowKind::DeviceCode,
		}
	}

	/// Stable label used in configuration errors.
	pub const fn label(&self) -> &'static str {
		self.kind().as_str()
	}

	/// Username that scopes the cache entry; only the password grant has one.
	pub fn username(&self) -> Option<&str> {
		match self {
			Grant::Password(option) => Some(option.username.as_str()),
			_ => None,
		}
	}

	/// Runs the selected strategy.
	pub async fn run(
		&self,
		cancel: &CancellationToken,
		client: &dyn OidcClient,
		interaction: &Interaction,
	) -> Result<GrantOutput> {
		obs::observe(self.kind(), "grant", async move {
			match self {
				Grant::AuthCodeBrowser(option) =>
					auth_code_browser::run(cancel, option, client, interaction.browser.as_ref())
						.await,
				Grant::AuthCodeKeyboard(option) =>
					auth_code_keyboard::run(cancel, option, client, interaction.prompt.as_ref())
						.await,
				Grant::Password(option) =>
					password::run(cancel, option, client, interaction.prompt.as_ref()).await,
				Grant::ClientCredentials(input) =>
					client_credentials::run(cancel, Some(input), client)
						.await
						.map(GrantOutput::without_nonce),
				Grant::DeviceCode(option) =>
					device_code::run(cancel, option, client, interaction.browser.as_ref())
						.await
						.map(GrantOutput::without_nonce),
			}
		})
		.await
	}
}
