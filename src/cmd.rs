//! Command line surface: `get-token`, `setup`, and `clean`.
//!
//! Flags follow the names `kubectl oidc-login` users already have in their kubeconfigs.

// std
use std::{ffi::OsString, io};
// crates.io
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
// self
use crate::{
	_prelude::*,
	app::{self, App, Dependencies},
	authentication::Input,
	credential_plugin::{EXEC_INFO_ENV, GetTokenInput},
	error::ConfigError,
	flows::{
		AuthCodeBrowserOption, AuthCodeKeyboardOption, DeviceCodeOption, GrantOptionSet,
		PasswordOption, auth_code_keyboard::OOB_REDIRECT_URI,
	},
	oidc::{ClientCredentialsInput, Provider},
	setup::SetupInput,
	store::{CacheConfig, Storage},
	tls::TlsClientConfig,
};

const DEFAULT_LISTEN_ADDRESSES: [&str; 2] = ["127.0.0.1:8000", "127.0.0.1:18000"];
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Kubernetes credential plugin for OpenID Connect providers.
#[derive(Debug, Parser)]
#[command(name = "kubectl-oidc_login", version, about)]
pub struct Cli {
	/// Log filter, in `tracing_subscriber::EnvFilter` syntax.
	#[arg(long, global = true, env = "KUBE_OIDC_LOGIN_LOG", default_value = "info")]
	pub log_level: String,
	/// Subcommand to run.
	#[command(subcommand)]
	pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Print an ExecCredential for kubectl, authenticating when needed.
	GetToken(GetTokenArgs),
	/// Authenticate once and print kubeconfig instructions.
	Setup(SetupArgs),
	/// Delete the token cache.
	Clean(CleanArgs),
}

/// Grant type selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrantTypeArg {
	/// Password grant when `--username` is set, else the browser flow.
	#[default]
	Auto,
	/// Authorization code grant with a local redirect listener.
	AuthCode,
	/// Authorization code grant with the code typed on the terminal.
	AuthCodeKeyboard,
	/// Resource owner password credentials grant.
	Password,
	/// Client credentials grant.
	ClientCredentials,
	/// Device authorization grant.
	DeviceCode,
}
impl FromStr for GrantTypeArg {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"auto" => Ok(Self::Auto),
			"authcode" => Ok(Self::AuthCode),
			"authcode-keyboard" => Ok(Self::AuthCodeKeyboard),
			"password" => Ok(Self::Password),
			"client-credentials" => Ok(Self::ClientCredentials),
			"device-code" => Ok(Self::DeviceCode),
			other => Err(ConfigError::UnknownGrantType { value: other.to_owned() }),
		}
	}
}

/// Provider, grant, and transport flags shared by `get-token` and `setup`.
#[derive(Clone, Debug, Args)]
pub struct AuthenticationArgs {
	/// Issuer URL of the provider.
	#[arg(long)]
	pub oidc_issuer_url: String,
	/// Client ID of the provider.
	#[arg(long)]
	pub oidc_client_id: String,
	/// Client secret of the provider.
	#[arg(long, env = "OIDC_CLIENT_SECRET", hide_env_values = true)]
	pub oidc_client_secret: Option<String>,
	/// Scopes requested in addition to `openid`.
	#[arg(long)]
	pub oidc_extra_scope: Vec<String>,
	/// Audience requested from the provider.
	#[arg(long)]
	pub oidc_audience: Option<String>,
	/// Grant type: auto, authcode, authcode-keyboard, password, client-credentials, device-code.
	#[arg(long, default_value = "auto")]
	pub grant_type: GrantTypeArg,
	/// Redirect listener addresses, tried in order.
	#[arg(long, default_values_t = DEFAULT_LISTEN_ADDRESSES.map(String::from))]
	pub listen_address: Vec<String>,
	/// Hostname of the redirect URI.
	#[arg(long, default_value = "localhost")]
	pub oidc_redirect_url_hostname: String,
	/// Redirect URI of the keyboard flow.
	#[arg(long, default_value = OOB_REDIRECT_URI)]
	pub oidc_redirect_url_authcode_keyboard: String,
	/// Extra authorization request parameters in KEY=VALUE form.
	#[arg(long, value_parser = parse_extra_param)]
	pub oidc_auth_request_extra_params: Vec<(String, String)>,
	/// Print URLs instead of opening a browser.
	#[arg(long)]
	pub skip_open_browser: bool,
	/// Command used to open URLs.
	#[arg(long, env = "BROWSER")]
	pub browser_command: Option<String>,
	/// Username of the password grant.
	#[arg(long)]
	pub username: Option<String>,
	/// Password of the password grant; prompted for when omitted.
	#[arg(long)]
	pub password: Option<String>,
	/// Seconds before an interactive authentication is abandoned.
	#[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
	pub authentication_timeout_sec: u64,
	/// PEM file of an extra trusted CA.
	#[arg(long)]
	pub certificate_authority: Vec<PathBuf>,
	/// Base64-encoded PEM of an extra trusted CA.
	#[arg(long)]
	pub certificate_authority_data: Vec<String>,
	/// Skip TLS certificate verification.
	#[arg(long)]
	pub insecure_skip_tls_verify: bool,
}
impl AuthenticationArgs {
	/// Provider configuration.
	pub fn provider(&self) -> Provider {
		Provider {
			issuer_url: self.oidc_issuer_url.clone(),
			client_id: self.oidc_client_id.clone(),
			client_secret: self.oidc_client_secret.clone(),
			extra_scopes: self.oidc_extra_scope.clone(),
			audience: self.oidc_audience.clone(),
		}
	}

	/// Transport configuration.
	pub fn tls(&self) -> TlsClientConfig {
		TlsClientConfig {
			ca_cert_files: self.certificate_authority.clone(),
			ca_cert_data: self.certificate_authority_data.clone(),
			skip_verify: self.insecure_skip_tls_verify,
		}
	}

	/// The single grant option selected by `--grant-type`.
	pub fn grant_options(&self) -> Result<GrantOptionSet, ConfigError> {
		let mut options = GrantOptionSet::default();
		let grant_type = match (self.grant_type, &self.username) {
			(GrantTypeArg::Auto, Some(_)) => GrantTypeArg::Password,
			(GrantTypeArg::Auto, None) => GrantTypeArg::AuthCode,
			(explicit, _) => explicit,
		};

		match grant_type {
			GrantTypeArg::Auto | GrantTypeArg::AuthCode =>
				options.auth_code_browser = Some(AuthCodeBrowserOption {
					listen_addresses: self.listen_address.clone(),
					redirect_url_hostname: self.oidc_redirect_url_hostname.clone(),
					skip_open_browser: self.skip_open_browser,
					auth_request_extra_params: self.oidc_auth_request_extra_params.clone(),
				}),
			GrantTypeArg::AuthCodeKeyboard =>
				options.auth_code_keyboard = Some(AuthCodeKeyboardOption {
					redirect_url: self.oidc_redirect_url_authcode_keyboard.clone(),
					auth_request_extra_params: self.oidc_auth_request_extra_params.clone(),
				}),
			GrantTypeArg::Password => {
				let username = self
					.username
					.clone()
					.ok_or(ConfigError::MissingGrantInput { grant: "password" })?;

				options.password = Some(PasswordOption { username, password: self.password.clone() });
			},
			GrantTypeArg::ClientCredentials => {
				let mut endpoint_params = self.oidc_auth_request_extra_params.clone();

				if let Some(audience) = &self.oidc_audience {
					endpoint_params.push(("audience".into(), audience.clone()));
				}

				options.client_credentials = Some(ClientCredentialsInput {
					scopes: self.oidc_extra_scope.clone(),
					endpoint_params,
				});
			},
			GrantTypeArg::DeviceCode =>
				options.device_code =
					Some(DeviceCodeOption { skip_open_browser: self.skip_open_browser }),
		}

		Ok(options)
	}

	/// Flags that differ from their defaults, rendered as `--flag=value`.
	pub fn changed_flags(&self) -> Vec<String> {
		let mut flags = vec![
			format!("--oidc-issuer-url={}", self.oidc_issuer_url),
			format!("--oidc-client-id={}", self.oidc_client_id),
		];
		let mut push = |name: &str, value: &str| flags.push(format!("--{name}={value}"));

		if let Some(secret) = &self.oidc_client_secret {
			push("oidc-client-secret", secret);
		}
		for scope in &self.oidc_extra_scope {
			push("oidc-extra-scope", scope);
		}
		if let Some(audience) = &self.oidc_audience {
			push("oidc-audience", audience);
		}
		if self.grant_type != GrantTypeArg::Auto {
			push("grant-type", grant_type_label(self.grant_type));
		}
		if self.listen_address != DEFAULT_LISTEN_ADDRESSES {
			for address in &self.listen_address {
				push("listen-address", address);
			}
		}
		if self.oidc_redirect_url_hostname != "localhost" {
			push("oidc-redirect-url-hostname", &self.oidc_redirect_url_hostname);
		}
		if self.oidc_redirect_url_authcode_keyboard != OOB_REDIRECT_URI {
			push("oidc-redirect-url-authcode-keyboard", &self.oidc_redirect_url_authcode_keyboard);
		}
		for (key, value) in &self.oidc_auth_request_extra_params {
			push("oidc-auth-request-extra-params", &format!("{key}={value}"));
		}
		if let Some(username) = &self.username {
			push("username", username);
		}
		if self.authentication_timeout_sec != DEFAULT_TIMEOUT_SECS {
			push("authentication-timeout-sec", &self.authentication_timeout_sec.to_string());
		}
		for path in &self.certificate_authority {
			push("certificate-authority", &path.display().to_string());
		}
		for data in &self.certificate_authority_data {
			push("certificate-authority-data", data);
		}

		if self.skip_open_browser {
			flags.push("--skip-open-browser".into());
		}
		if self.insecure_skip_tls_verify {
			flags.push("--insecure-skip-tls-verify".into());
		}

		flags
	}

	fn timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.authentication_timeout_sec)
	}
}

/// `get-token` flags.
#[derive(Clone, Debug, Args)]
pub struct GetTokenArgs {
	/// Provider, grant, and transport flags.
	#[command(flatten)]
	pub authentication: AuthenticationArgs,
	/// Token cache directory.
	#[arg(long)]
	pub token_cache_dir: Option<PathBuf>,
	/// Token cache storage: disk or keyring.
	#[arg(long, default_value = "disk")]
	pub token_cache_storage: Storage,
	/// Ignore a valid cached token.
	#[arg(long)]
	pub force_refresh: bool,
}

/// `setup` flags.
#[derive(Clone, Debug, Args)]
pub struct SetupArgs {
	/// Provider, grant, and transport flags.
	#[command(flatten)]
	pub authentication: AuthenticationArgs,
}

/// `clean` flags.
#[derive(Clone, Debug, Args)]
pub struct CleanArgs {
	/// Token cache directory.
	#[arg(long)]
	pub token_cache_dir: Option<PathBuf>,
}

/// Parses one `KEY=VALUE` extra parameter.
pub fn parse_extra_param(value: &str) -> Result<(String, String), ConfigError> {
	match value.split_once('=') {
		Some((key, param)) if !key.is_empty() => Ok((key.to_owned(), param.to_owned())),
		_ => Err(ConfigError::InvalidExtraParam { value: value.to_owned() }),
	}
}

/// `~/.kube/cache/oidc-login`, relative to the working directory when no home is known.
pub fn default_cache_dir() -> PathBuf {
	default_cache_dir_from(std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")))
}

fn default_cache_dir_from(home: Option<OsString>) -> PathBuf {
	home.map(PathBuf::from).unwrap_or_default().join(".kube").join("cache").join("oidc-login")
}

/// Installs the stderr `tracing` subscriber; stdout is reserved for the credential.
pub fn init_tracing(filter: &str) {
	let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.try_init();
}

/// Runs `cli` with production collaborators; `cancel` is fired by signals or the timeout.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
	match cli.command {
		Command::GetToken(args) => {
			let app = assemble(&args.authentication);
			let input = GetTokenInput {
				authentication: Input {
					provider: args.authentication.provider(),
					grant_options: args.authentication.grant_options()?,
					tls: args.authentication.tls(),
					cache: Some(CacheConfig {
						directory: args.token_cache_dir.unwrap_or_else(default_cache_dir),
						storage: args.token_cache_storage,
					}),
					force_refresh: args.force_refresh,
				},
				exec_info: std::env::var(EXEC_INFO_ENV).ok(),
			};
			let _timeout = spawn_timeout(&cancel, args.authentication.timeout());

			app.get_token.run(&cancel, input, io::stdout()).await
		},
		Command::Setup(args) => {
			let app = assemble(&args.authentication);
			let input = SetupInput {
				authentication: Input {
					provider: args.authentication.provider(),
					grant_options: args.authentication.grant_options()?,
					tls: args.authentication.tls(),
					cache: None,
					force_refresh: true,
				},
				changed_flags: args.authentication.changed_flags(),
			};
			let _timeout = spawn_timeout(&cancel, args.authentication.timeout());

			app.setup.run(&cancel, input, io::stdout()).await
		},
		Command::Clean(args) => {
			let app = app::assemble(Dependencies::system(None));
			let directory = args.token_cache_dir.unwrap_or_else(default_cache_dir);

			app.clean.run(&directory).await
		},
	}
}

fn assemble(args: &AuthenticationArgs) -> App {
	app::assemble(Dependencies::system(args.browser_command.clone()))
}

/// Cancels `cancel` after `timeout`; the timer stops when the guard drops.
fn spawn_timeout(
	cancel: &CancellationToken,
	timeout: std::time::Duration,
) -> tokio_util::sync::DropGuard {
	let guard = CancellationToken::new();
	let done = guard.clone();
	let cancel = cancel.clone();

	tokio::spawn(async move {
		tokio::select! {
			_ = done.cancelled() => (),
			_ = tokio::time::sleep(timeout) => {
				tracing::warn!(timeout_secs = timeout.as_secs(), "Authentication timed out.");
				cancel.cancel();
			},
		}
	});

	guard.drop_guard()
}

fn grant_type_label(grant_type: GrantTypeArg) -> &'static str {
	match grant_type {
		GrantTypeArg::Auto => "auto",
		GrantTypeArg::AuthCode => "authcode",
		GrantTypeArg::AuthCodeKeyboard => "authcode-keyboard",
		GrantTypeArg::Password => "password",
		GrantTypeArg::ClientCredentials => "client-credentials",
		GrantTypeArg::DeviceCode => "device-code",
	}
}
