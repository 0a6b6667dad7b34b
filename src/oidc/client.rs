//! Provider client facade over `oauth2` and raw HTTP.
//!
//! Discovery runs once per [`ProviderClient`], and the JWKS is fetched lazily at most once.
//! Authorization code, password, client credentials, and refresh exchanges go through the
//! `oauth2` request builders; discovery, JWKS, and the device authorization grant are plain
//! JSON calls on the same instrumented transport so every failure is classified the same way.

// std
use std::borrow::Cow;
// crates.io
use async_lock::OnceCell;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::jwk::JwkSet;
use oauth2::{
	AsyncHttpClient, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, HttpRequest, HttpResponse, PkceCodeVerifier, RedirectUrl,
	RefreshToken, RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, Scope,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError, ValidationError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oidc::{
		GrantType, Provider, ProviderMetadata, TokenSecret, TokenSet,
		classify::ProviderErrorContext,
	},
	pkce,
	scope::ScopeSet,
	tls::TlsClientConfig,
};

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type OidcOAuthClient<HasTokenUrl> = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	HasTokenUrl,
>;
type ConfiguredClient = OidcOAuthClient<EndpointSet>;
type TokenRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Boxed future returned by [`OidcClient`] and [`OidcConnector`] implementations.
pub type OidcFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Wire operations against one discovered provider.
pub trait OidcClient
where
	Self: Send + Sync,
{
	/// Discovered provider metadata.
	fn metadata(&self) -> &ProviderMetadata;

	/// PKCE method negotiated from the discovery document.
	fn supported_pkce_method(&self) -> pkce::Method {
		pkce::Method::negotiate(&self.metadata().code_challenge_methods_supported)
	}

	/// Builds the authorization endpoint URL for a code flow.
	fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Url;

	/// Exchanges an authorization code.
	fn exchange_authorization_code<'a>(
		&'a self,
		exchange: CodeExchange<'a>,
	) -> OidcFuture<'a, TokenSet>;

	/// Resource owner password credentials grant.
	fn exchange_password<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> OidcFuture<'a, TokenSet>;

	/// Client credentials grant.
	fn exchange_client_credentials<'a>(
		&'a self,
		input: &'a ClientCredentialsInput,
	) -> OidcFuture<'a, TokenSet>;

	/// Starts the device authorization grant.
	fn request_device_authorization(&self) -> OidcFuture<'_, DeviceAuthorization>;

	/// Polls the token endpoint once for a device code.
	fn poll_device_token<'a>(&'a self, device_code: &'a str) -> OidcFuture<'a, DevicePoll>;

	/// Refresh token grant; keeps `refresh_token` when the provider does not rotate it.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> OidcFuture<'a, TokenSet>;

	/// Provider signing keys.
	fn key_set(&self) -> OidcFuture<'_, JwkSet>;
}

/// Creates [`OidcClient`]s; discovery happens here, so callers connect only when needed.
pub trait OidcConnector
where
	Self: Send + Sync,
{
	/// Discovers `provider` using a transport built from `tls`.
	fn connect<'a>(
		&'a self,
		provider: &'a Provider,
		tls: &'a TlsClientConfig,
	) -> OidcFuture<'a, Box<dyn OidcClient>>;
}

/// Production connector backed by reqwest.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestConnector;
impl OidcConnector for ReqwestConnector {
	fn connect<'a>(
		&'a self,
		provider: &'a Provider,
		tls: &'a TlsClientConfig,
	) -> OidcFuture<'a, Box<dyn OidcClient>> {
		Box::pin(async move {
			let http_client = ReqwestHttpClient::from_tls_config(tls)?;
			let client = <ProviderClient<ReqwestHttpClient, ReqwestTransportErrorMapper>>::discover(
				provider.clone(),
				http_client,
				ReqwestTransportErrorMapper,
			)
			.await?;

			Ok(Box::new(client) as Box<dyn OidcClient>)
		})
	}
}

/// Parameters of one authorization request.
#[derive(Clone, Copy, Debug)]
pub struct AuthorizationRequest<'a> {
	/// Redirect URI registered for the flow.
	pub redirect_uri: &'a str,
	/// Anti-CSRF state echoed back by the provider.
	pub state: &'a str,
	/// Nonce echoed in the ID token.
	pub nonce: &'a str,
	/// PKCE parameters for this attempt.
	pub pkce: &'a pkce::Params,
	/// Operator-supplied extra query parameters.
	pub extra_params: &'a [(String, String)],
}

/// Inputs of an authorization code exchange.
#[derive(Clone, Copy, Debug)]
pub struct CodeExchange<'a> {
	/// Code returned by the provider.
	pub code: &'a str,
	/// Redirect URI used in the authorization request.
	pub redirect_uri: &'a str,
	/// PKCE parameters used in the authorization request.
	pub pkce: &'a pkce::Params,
}

/// Inputs of the client credentials grant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientCredentialsInput {
	/// Scopes to request; sent as-is.
	pub scopes: Vec<String>,
	/// Extra form parameters such as `audience` or `resource`.
	pub endpoint_params: Vec<(String, String)>,
}

/// Device authorization response (RFC 8628 section 3.2).
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceAuthorization {
	/// Code used to poll the token endpoint.
	pub device_code: TokenSecret,
	/// Code the operator types at the verification URI.
	pub user_code: String,
	/// Where the operator enters the user code.
	#[serde(alias = "verification_url")]
	pub verification_uri: String,
	/// Verification URI with the user code embedded.
	#[serde(default)]
	pub verification_uri_complete: Option<String>,
	/// Lifetime of the device code in seconds.
	pub expires_in: u64,
	/// Minimum polling interval in seconds.
	#[serde(default)]
	pub interval: Option<u64>,
}

/// Outcome of a single device token poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DevicePoll {
	/// `authorization_pending`.
	Pending,
	/// `slow_down`; the caller must lengthen its interval.
	SlowDown,
	/// Tokens were issued.
	Complete(TokenSet),
}

/// `id_token` carried next to the standard token response fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Raw ID token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised while calling `operation`.
	fn map_transport_error(
		&self,
		operation: &'static str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		operation: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(operation, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransientError::Endpoint {
				message: format!(
					"HTTP client error while calling the {operation} endpoint: {message}"
				),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => TransientError::Endpoint {
				message: format!("HTTP client error while calling the {operation} endpoint"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// [`OidcClient`] for one discovered provider.
pub struct ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	provider: Provider,
	scopes: ScopeSet,
	metadata: ProviderMetadata,
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	keys: OnceCell<JwkSet>,
}
impl<C, M> ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches the discovery document and checks that it describes `provider`'s issuer.
	pub async fn discover(
		provider: Provider,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let http_client = http_client.into();
		let error_mapper = error_mapper.into();
		let url = ProviderMetadata::discovery_url(&provider.issuer_url).map_err(|source| {
			ConfigError::InvalidIssuer { issuer: provider.issuer_url.clone(), source }
		})?;

		tracing::debug!(%url, "Fetching provider discovery document.");

		let metadata: ProviderMetadata =
			fetch_json(http_client.as_ref(), error_mapper.as_ref(), "discovery", &url)
				.await
				.map_err(|e| Error::Discovery {
					issuer: provider.issuer_url.clone(),
					reason: e.to_string(),
				})?;

		if !metadata.issuer_matches(&provider.issuer_url) {
			return Err(Error::Discovery {
				issuer: provider.issuer_url.clone(),
				reason: format!("discovery document names issuer {}", metadata.issuer),
			});
		}

		Self::from_metadata(provider, metadata, http_client, error_mapper)
	}

	/// Builds a client from already discovered metadata.
	pub fn from_metadata(
		provider: Provider,
		metadata: ProviderMetadata,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(metadata.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let mut oauth_client =
			<OidcOAuthClient<EndpointNotSet>>::new(ClientId::new(provider.client_id.clone()))
				.set_token_uri(token_url);

		if let Some(secret) = &provider.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.clone()));
		}

		let scopes = provider.requested_scopes()?;

		Ok(Self {
			provider,
			scopes,
			metadata,
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			keys: OnceCell::new(),
		})
	}

	fn map_request_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: TokenRequestError<C::TransportError>,
	) -> Error {
		let meta = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) => ProviderErrorContext::default()
				.with_oauth_error(response.error().as_ref())
				.with_error_description(response.error_description().cloned())
				.with_http_status(meta_status(meta))
				.with_retry_after(meta_retry_after(meta))
				.into_error("token"),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error("token", meta, error),
			RequestTokenError::Parse(source, _body) =>
				TransientError::ResponseParse { source, status: meta_status(meta) }.into(),
			RequestTokenError::Other(message) => TransientError::Endpoint {
				message: format!("Token endpoint returned an unexpected response: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}

	fn form_post(&self, url: &Url, params: &[(&str, &str)]) -> Result<HttpRequest> {
		let mut form = url::form_urlencoded::Serializer::new(String::new());
		let mut builder = Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded");

		form.extend_pairs(params.iter());

		match &self.provider.client_secret {
			Some(secret) =>
				builder =
					builder.header(AUTHORIZATION, basic_auth(&self.provider.client_id, secret)),
			None => {
				form.append_pair("client_id", &self.provider.client_id);
			},
		}

		builder.body(form.finish().into_bytes()).map_err(|e| ConfigError::from(e).into())
	}
}
impl<C, M> OidcClient for ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn metadata(&self) -> &ProviderMetadata {
		&self.metadata
	}

	fn authorization_url(&self, request: &AuthorizationRequest<'_>) -> Url {
		let mut url = self.metadata.authorization_endpoint.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.provider.client_id);
		pairs.append_pair("redirect_uri", request.redirect_uri);
		pairs.append_pair("scope", &self.scopes.normalized());
		pairs.append_pair("state", request.state);
		pairs.append_pair("nonce", request.nonce);

		if let Some(options) = request.pkce.auth_code_option() {
			for (key, value) in options {
				pairs.append_pair(key, &value);
			}
		}
		for (key, value) in request.extra_params {
			pairs.append_pair(key, value);
		}

		drop(pairs);

		url
	}

	fn exchange_authorization_code<'a>(
		&'a self,
		exchange: CodeExchange<'a>,
	) -> OidcFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let redirect_url = RedirectUrl::new(exchange.redirect_uri.to_owned()).map_err(
				|source| ConfigError::InvalidRedirect { uri: exchange.redirect_uri.into(), source },
			)?;
			let mut request = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(exchange.code.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url));

			if let Some((_, verifier)) = exchange.pkce.token_request_option() {
				request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			token_set_from_response(response, GrantType::AuthorizationCode, None)
		})
	}

	fn exchange_password<'a>(
		&'a self,
		username: &'a str,
		password: &'a str,
	) -> OidcFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let username = ResourceOwnerUsername::new(username.to_owned());
			let password = ResourceOwnerPassword::new(password.to_owned());
			let response = self
				.oauth_client
				.exchange_password(&username, &password)
				.add_scopes(self.scopes.iter().map(|scope| Scope::new(scope.to_owned())))
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			token_set_from_response(response, GrantType::Password, None)
		})
	}

	fn exchange_client_credentials<'a>(
		&'a self,
		input: &'a ClientCredentialsInput,
	) -> OidcFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			for scope in &input.scopes {
				request = request.add_scope(Scope::new(scope.clone()));
			}
			for (key, value) in &input.endpoint_params {
				request = request.add_extra_param(key, value);
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			token_set_from_response(response, GrantType::ClientCredentials, None)
		})
	}

	fn request_device_authorization(&self) -> OidcFuture<'_, DeviceAuthorization> {
		Box::pin(async move {
			let endpoint = self
				.metadata
				.device_authorization_endpoint
				.as_ref()
				.ok_or(ConfigError::MissingDeviceEndpoint)?;
			let scope = self.scopes.normalized();
			let request = self.form_post(endpoint, &[("scope", scope.as_str())])?;
			let (response, meta) = send(
				self.http_client.as_ref(),
				self.error_mapper.as_ref(),
				"device authorization",
				request,
			)
			.await?;

			if !response.status().is_success() {
				let ctx = error_response_context(&response, meta.as_ref());

				return Err(ctx.into_error("device authorization"));
			}

			decode_json(response.body(), meta_status(meta.as_ref()))
		})
	}

	fn poll_device_token<'a>(&'a self, device_code: &'a str) -> OidcFuture<'a, DevicePoll> {
		Box::pin(async move {
			let request = self.form_post(
				&self.metadata.token_endpoint,
				&[("grant_type", GrantType::DeviceCode.as_str()), ("device_code", device_code)],
			)?;
			let (response, meta) =
				send(self.http_client.as_ref(), self.error_mapper.as_ref(), "token", request)
					.await?;

			if response.status().is_success() {
				let token: OidcTokenResponse =
					decode_json(response.body(), meta_status(meta.as_ref()))?;

				return token_set_from_response(token, GrantType::DeviceCode, None)
					.map(DevicePoll::Complete);
			}

			let ctx = error_response_context(&response, meta.as_ref());

			match ctx.oauth_error.as_deref() {
				Some("authorization_pending") => Ok(DevicePoll::Pending),
				Some("slow_down") => Ok(DevicePoll::SlowDown),
				_ => Err(ctx.into_error("token")),
			}
		})
	}

	fn refresh<'a>(&'a self, refresh_token: &'a str) -> OidcFuture<'a, TokenSet> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.add_scopes(self.scopes.iter().map(|scope| Scope::new(scope.to_owned())))
				.request_async(&instrumented)
				.await
				.map_err(|err| self.map_request_error(meta.take(), err))?;

			token_set_from_response(response, GrantType::RefreshToken, Some(refresh_token))
		})
	}

	fn key_set(&self) -> OidcFuture<'_, JwkSet> {
		Box::pin(async move {
			let keys = self
				.keys
				.get_or_try_init(|| {
					fetch_json::<JwkSet, C, M>(
						self.http_client.as_ref(),
						self.error_mapper.as_ref(),
						"jwks",
						&self.metadata.jwks_uri,
					)
				})
				.await?;

			Ok(keys.clone())
		})
	}
}
impl<C, M> Debug for ProviderClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderClient")
			.field("provider", &self.provider)
			.field("metadata", &self.metadata)
			.field("keys_loaded", &self.keys.is_initialized())
			.finish()
	}
}

fn token_set_from_response(
	response: OidcTokenResponse,
	grant: GrantType,
	previous_refresh: Option<&str>,
) -> Result<TokenSet> {
	let access_token = response.access_token().secret().to_owned();
	let id_token = match response.extra_fields().id_token.clone() {
		Some(id_token) => id_token,
		// Providers issue no ID token for machine identities; the access token is the bearer.
		None if grant == GrantType::ClientCredentials => access_token.clone(),
		None => return Err(ValidationError::MissingIdToken { grant: grant.as_str() }.into()),
	};
	let refresh_token = response
		.refresh_token()
		.map(|token| token.secret().to_owned())
		.or_else(|| previous_refresh.map(str::to_owned));
	let mut token_set = TokenSet::new(id_token, access_token);

	if let Some(refresh_token) = refresh_token {
		token_set = token_set.with_refresh_token(refresh_token);
	}

	Ok(token_set)
}

async fn send<C, M>(
	http_client: &C,
	error_mapper: &M,
	operation: &'static str,
	request: HttpRequest,
) -> Result<(HttpResponse, Option<ResponseMetadata>)>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());

	match handle.call(request).await {
		Ok(response) => Ok((response, slot.take())),
		Err(e) => Err(error_mapper.map_transport_error(operation, slot.take().as_ref(), e)),
	}
}

async fn fetch_json<T, C, M>(
	http_client: &C,
	error_mapper: &M,
	operation: &'static str,
	url: &Url,
) -> Result<T>
where
	T: DeserializeOwned,
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = Request::builder()
		.method(Method::GET)
		.uri(url.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(ConfigError::from)?;
	let (response, meta) = send(http_client, error_mapper, operation, request).await?;

	if !response.status().is_success() {
		return Err(error_response_context(&response, meta.as_ref()).into_error(operation));
	}

	decode_json(response.body(), meta_status(meta.as_ref()))
}

fn decode_json<T>(body: &[u8], status: Option<u16>) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::ResponseParse { source, status }.into())
}

fn error_response_context(
	response: &HttpResponse,
	meta: Option<&ResponseMetadata>,
) -> ProviderErrorContext {
	let ctx = ProviderErrorContext::default()
		.with_http_status(Some(response.status().as_u16()))
		.with_retry_after(meta_retry_after(meta));

	match serde_json::from_slice::<BasicErrorResponse>(response.body()) {
		Ok(error) => ctx
			.with_oauth_error(error.error().as_ref())
			.with_error_description(error.error_description().cloned()),
		Err(_) => ctx.with_body_preview(response.body()),
	}
}

fn basic_auth(client_id: &str, secret: &str) -> String {
	let encode =
		|value: &str| url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>();
	let credentials = format!("{}:{}", encode(client_id), encode(secret));

	format!("Basic {}", STANDARD.encode(credentials))
}

fn map_reqwest_error(
	operation: &'static str,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Endpoint {
			message: format!("Request timed out while calling the {operation} endpoint"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn metadata() -> ProviderMetadata {
		serde_json::from_value(serde_json::json!({
			"issuer": "https://issuer.example.com",
			"authorization_endpoint": "https://issuer.example.com/auth?tenant=a",
			"token_endpoint": "https://issuer.example.com/token",
			"jwks_uri": "https://issuer.example.com/keys",
			"code_challenge_methods_supported": ["plain", "S256"],
		}))
		.expect("Metadata fixture should parse.")
	}

	fn client(
		secret: Option<&str>,
	) -> ProviderClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
		let provider = Provider {
			issuer_url: "https://issuer.example.com".into(),
			client_id: "kube client".into(),
			client_secret: secret.map(str::to_owned),
			extra_scopes: vec!["email".into()],
			audience: None,
		};

		ProviderClient::from_metadata(
			provider,
			metadata(),
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
		.expect("Client fixture should build.")
	}

	#[test]
	fn authorization_url_carries_every_parameter() {
		let client = client(None);
		let pkce = pkce::Params::new(client.supported_pkce_method())
			.expect("PKCE parameters should generate.");
		let extra = vec![("prompt".to_owned(), "consent".to_owned())];
		let url = client.authorization_url(&AuthorizationRequest {
			redirect_uri: "http://localhost:8000",
			state: "state-1",
			nonce: "nonce-1",
			pkce: &pkce,
			extra_params: &extra,
		});
		let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

		assert_eq!(pairs["tenant"], "a");
		assert_eq!(pairs["response_type"], "code");
		assert_eq!(pairs["client_id"], "kube client");
		assert_eq!(pairs["redirect_uri"], "http://localhost:8000");
		assert_eq!(pairs["scope"], "email openid");
		assert_eq!(pairs["state"], "state-1");
		assert_eq!(pairs["nonce"], "nonce-1");
		assert_eq!(pairs["code_challenge_method"], "S256");
		assert_eq!(Some(pairs["code_challenge"].clone()), pkce.challenge());
		assert_eq!(pairs["prompt"], "consent");
	}

	#[test]
	fn form_post_uses_basic_auth_for_confidential_clients() {
		let request = client(Some("s3cr:t"))
			.form_post(&metadata().token_endpoint, &[("grant_type", "x")])
			.expect("Request should build.");
		let header = request.headers()[AUTHORIZATION].to_str().expect("Header should be ASCII.");

		assert_eq!(header, format!("Basic {}", STANDARD.encode("kube+client:s3cr%3At")));
		assert_eq!(request.body().as_slice(), b"grant_type=x");
	}

	#[test]
	fn form_post_sends_client_id_for_public_clients() {
		let request = client(None)
			.form_post(&metadata().token_endpoint, &[("grant_type", "x")])
			.expect("Request should build.");

		assert!(request.headers().get(AUTHORIZATION).is_none());
		assert_eq!(request.body().as_slice(), b"grant_type=x&client_id=kube+client");
	}

	#[test]
	fn missing_id_token_only_tolerated_for_client_credentials() {
		let response: OidcTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "at",
			"token_type": "Bearer",
		}))
		.expect("Token response fixture should parse.");
		let set = token_set_from_response(response.clone(), GrantType::ClientCredentials, None)
			.expect("Client credentials should fall back to the access token.");

		assert_eq!(set.id_token.expose(), "at");

		let err = token_set_from_response(response, GrantType::Password, None)
			.expect_err("Password grant must return an ID token.");

		assert!(matches!(err, Error::Validation(ValidationError::MissingIdToken { .. })));
	}

	#[test]
	fn refresh_keeps_previous_refresh_token() {
		let response: OidcTokenResponse = serde_json::from_value(serde_json::json!({
			"access_token": "at",
			"token_type": "Bearer",
			"id_token": "id",
		}))
		.expect("Token response fixture should parse.");
		let set = token_set_from_response(response, GrantType::RefreshToken, Some("rt-old"))
			.expect("Refresh response should map.");

		assert_eq!(set.refresh_token.as_ref().map(TokenSecret::expose), Some("rt-old"));
	}
}
