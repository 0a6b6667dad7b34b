#![allow(dead_code)]

// std
use std::collections::VecDeque;
// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header, jwk::JwkSet};
use parking_lot::Mutex;
use serde_json::json;
use time::{OffsetDateTime, macros::datetime};
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use kube_oidc_login::{
	error::{Error, Result},
	flows::Interaction,
	interaction::{Browser, Prompt, PromptFuture},
	oidc::{
		AuthorizationRequest, ClientCredentialsInput, CodeExchange, DeviceAuthorization,
		DevicePoll, OidcClient, OidcConnector, OidcFuture, Provider, ProviderMetadata, TokenSet,
	},
	tls::TlsClientConfig,
};

pub const CLIENT_ID: &str = "kubernetes";
pub const NOW: OffsetDateTime = datetime!(2026-10-19 08:00:00 UTC);

const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");

pub fn key_set() -> JwkSet {
	serde_json::from_str(JWKS).expect("JWKS fixture should parse.")
}

/// Signs an ID token with the fixture key.
pub fn id_token(issuer: &str, audience: &str, exp: OffsetDateTime, nonce: Option<&str>) -> String {
	let mut header = Header::new(Algorithm::RS256);

	header.kid = Some("test-key".into());

	let mut claims = json!({
		"iss": issuer,
		"sub": "YOUR_SUBJECT",
		"aud": audience,
		"exp": exp.unix_timestamp(),
		"iat": (exp - time::Duration::hours(1)).unix_timestamp(),
	});

	if let Some(nonce) = nonce {
		claims["nonce"] = json!(nonce);
	}

	let key = EncodingKey::from_rsa_pem(SIGNING_KEY).expect("Signing key fixture should load.");

	jsonwebtoken::encode(&header, &claims, &key).expect("ID token should sign.")
}

pub fn provider(issuer: &str) -> Provider {
	Provider { issuer_url: issuer.into(), client_id: CLIENT_ID.into(), ..Default::default() }
}

pub fn metadata(issuer: &str) -> ProviderMetadata {
	let endpoint = |path: &str| {
		Url::parse(&format!("{}{path}", issuer.trim_end_matches('/')))
			.expect("Endpoint fixture should parse.")
	};

	ProviderMetadata {
		issuer: issuer.into(),
		authorization_endpoint: endpoint("/authorize"),
		token_endpoint: endpoint("/token"),
		jwks_uri: endpoint("/jwks"),
		device_authorization_endpoint: Some(endpoint("/device")),
		code_challenge_methods_supported: vec!["S256".into()],
	}
}

type TokenResponder = Box<dyn FnOnce(Option<&str>) -> Result<TokenSet> + Send>;

#[derive(Default)]
struct Script {
	metadata: Option<ProviderMetadata>,
	nonce: Mutex<Option<String>>,
	tokens: Mutex<VecDeque<TokenResponder>>,
	refreshes: Mutex<VecDeque<Result<TokenSet>>>,
	device_authorization: Mutex<Option<DeviceAuthorization>>,
	device_polls: Mutex<VecDeque<Result<DevicePoll>>>,
	calls: Mutex<Vec<String>>,
	connects: Mutex<usize>,
}

/// In-process provider: both the connector and the connected client.
///
/// Grant responses are queued closures that receive the nonce of the last authorization URL.
#[derive(Clone)]
pub struct ScriptedProvider(std::sync::Arc<Script>);
impl ScriptedProvider {
	pub fn new(issuer: &str) -> Self {
		Self(std::sync::Arc::new(Script { metadata: Some(metadata(issuer)), ..Default::default() }))
	}

	pub fn issuer(&self) -> &str {
		&self.metadata().issuer
	}

	/// Queues a grant response carrying a valid ID token that echoes the request nonce.
	pub fn push_signed_grant(&self, exp: OffsetDateTime, refresh_token: Option<&str>) {
		let issuer = self.issuer().to_owned();
		let refresh_token = refresh_token.map(str::to_owned);

		self.push_grant(move |nonce| {
			let set = TokenSet::new(id_token(&issuer, CLIENT_ID, exp, nonce), "grant-access");

			Ok(match refresh_token {
				Some(refresh_token) => set.with_refresh_token(refresh_token),
				None => set,
			})
		});
	}

	pub fn push_grant(
		&self,
		responder: impl FnOnce(Option<&str>) -> Result<TokenSet> + Send + 'static,
	) {
		self.0.tokens.lock().push_back(Box::new(responder));
	}

	pub fn push_refresh(&self, result: Result<TokenSet>) {
		self.0.refreshes.lock().push_back(result);
	}

	pub fn set_device_authorization(&self, authorization: DeviceAuthorization) {
		*self.0.device_authorization.lock() = Some(authorization);
	}

	pub fn push_device_poll(&self, result: Result<DevicePoll>) {
		self.0.device_polls.lock().push_back(result);
	}

	pub fn calls(&self) -> Vec<String> {
		self.0.calls.lock().clone()
	}

	pub fn connects(&self) -> usize {
		*self.0.connects.lock()
	}

	fn record(&self, call: String) {
		self.0.calls.lock().push(call);
	}

	fn next_grant(&self) -> Result<TokenSet> {
		let responder = self.0.tokens.lock().pop_front();
		let nonce = self.0.nonce.lock().clone();

		match responder {
			Some(responder) => responder(nonce.as_deref()),
			None => Err(unscripted("grant")),
		}
	}
}
impl OidcClient for ScriptedProvider {
	fn metadata(&self) -> &ProviderMetadata {
		self.0.metadata.as_ref().expect("Scripted provider always has metadata.")
	}

	fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Url {
		*self.0.nonce.lock() = Some(request.nonce.to_owned());

		let mut url = self.metadata().authorization_endpoint.clone();

		url.query_pairs_mut()
			.append_pair("redirect_uri", request.redirect_uri)
			.append_pair("state", request.state)
			.append_pair("nonce", request.nonce)
			.extend_pairs(request.extra_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

		url
	}

	fn exchange_authorization_code<'a>(
		&'a self,
		exchange: CodeExchange<'a>,
	) -> OidcFuture<'a, TokenSet> {
		self.record(format!("authorization_code:{}:{}", exchange.code, exchange.redirect_uri));

		Box::pin(async move { self.next_grant() })
	}

	fn exchange_password<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> OidcFuture<'a, TokenSet> {
		self.record(format!("password:{username}:{password}"));

		Box::pin(async move { self.next_grant() })
	}

	fn exchange_client_credentials<'a>(
		&'a self,
		input: &'a ClientCredentialsInput,
	) -> OidcFuture<'a, TokenSet> {
		self.record(format!("client_credentials:{}", input.scopes.join(" ")));

		Box::pin(async move { self.next_grant() })
	}

	fn request_device_authorization(&self) -> OidcFuture<'_, DeviceAuthorization> {
		self.record("device_authorization".into());

		Box::pin(async move {
			self.0.device_authorization.lock().clone().ok_or_else(|| unscripted("device"))
		})
	}

	fn poll_device_token<'a>(&'a self, device_code: &'a str) -> OidcFuture<'a, DevicePoll> {
		self.record(format!("device_poll:{device_code}"));

		Box::pin(async move {
			self.0.device_polls.lock().pop_front().unwrap_or_else(|| Err(unscripted("poll")))
		})
	}

	fn refresh<'a>(&'a self, refresh_token: &'a str) -> OidcFuture<'a, TokenSet> {
		self.record(format!("refresh:{refresh_token}"));

		Box::pin(async move {
			self.0.refreshes.lock().pop_front().unwrap_or_else(|| Err(unscripted("refresh")))
		})
	}

	fn key_set(&self) -> OidcFuture<'_, JwkSet> {
		Box::pin(async move { Ok(key_set()) })
	}
}
impl OidcConnector for ScriptedProvider {
	fn connect<'a>(
		&'a self,
		_: &'a Provider,
		_: &'a TlsClientConfig,
	) -> OidcFuture<'a, Box<dyn OidcClient>> {
		*self.0.connects.lock() += 1;

		Box::pin(async move { Ok(Box::new(self.clone()) as Box<dyn OidcClient>) })
	}
}

fn unscripted(operation: &str) -> Error {
	Error::Provider { code: "unscripted".into(), description: format!("no {operation} response") }
}

/// Records opened URLs and optionally reacts to them.
#[derive(Default)]
pub struct RecordingBrowser {
	opened: Mutex<Vec<Url>>,
	on_open: Option<Box<dyn Fn(&Url) + Send + Sync>>,
}
impl RecordingBrowser {
	pub fn with_hook(hook: impl Fn(&Url) + Send + Sync + 'static) -> Self {
		Self { opened: Mutex::default(), on_open: Some(Box::new(hook)) }
	}

	pub fn opened(&self) -> Vec<Url> {
		self.opened.lock().clone()
	}
}
impl Browser for RecordingBrowser {
	fn open(&self, url: &Url) -> Result<()> {
		self.opened.lock().push(url.clone());

		if let Some(hook) = &self.on_open {
			hook(url);
		}

		Ok(())
	}
}

/// Answers prompts from a queue and records what was asked.
#[derive(Default)]
pub struct ScriptedPrompt {
	answers: Mutex<VecDeque<String>>,
	asked: Mutex<Vec<String>>,
}
impl ScriptedPrompt {
	pub fn new<I, S>(answers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { answers: Mutex::new(answers.into_iter().map(Into::into).collect()), ..Default::default() }
	}

	pub fn asked(&self) -> Vec<String> {
		self.asked.lock().clone()
	}

	fn answer(&self, prompt: &str) -> Result<String> {
		self.asked.lock().push(prompt.to_owned());
		self.answers.lock().pop_front().ok_or_else(|| unscripted("prompt"))
	}
}
impl Prompt for ScriptedPrompt {
	fn read_line<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String> {
		Box::pin(async move { self.answer(prompt) })
	}

	fn read_password<'a>(&'a self, prompt: &'a str) -> PromptFuture<'a, String> {
		Box::pin(async move { self.answer(prompt) })
	}
}

pub fn interaction(
	browser: std::sync::Arc<RecordingBrowser>,
	prompt: std::sync::Arc<ScriptedPrompt>,
) -> Interaction {
	Interaction { browser, prompt }
}

pub fn quiet_interaction() -> Interaction {
	interaction(Default::default(), Default::default())
}

pub fn cancel() -> CancellationToken {
	CancellationToken::new()
}
