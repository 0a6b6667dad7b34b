//! Authentication orchestrator: cache lookup, refresh, grant, validation, persistence.
//!
//! One [`Authentication::run`] call is one invocation. Configuration errors surface before
//! any I/O. Cache read failures degrade to a miss. A refresh that fails, or whose ID token
//! does not validate, falls through to the selected grant. Validation failures of a grant are
//! fatal. Cache write failures are carried in [`Output::cache_error`] without discarding the
//! fresh tokens.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	flows::{Grant, GrantOptionSet, GrantOutput, Interaction, common},
	obs::{self, FlowKind},
	oidc::{IdTokenClaims, IdTokenValidator, OidcClient, OidcConnector, Provider, TokenSet},
	store::{CacheConfig, CacheKey, StoreError, TokenCacheRepository},
	tls::TlsClientConfig,
};

/// Clock skew tolerated when deciding whether a cached ID token is still usable.
pub const EXPIRY_SKEW: Duration = Duration::seconds(60);

/// Per-invocation input.
#[derive(Clone, Debug, Default)]
pub struct Input {
	/// Identity provider.
	pub provider: Provider,
	/// Grant options; exactly one must be set.
	pub grant_options: GrantOptionSet,
	/// Transport configuration.
	pub tls: TlsClientConfig,
	/// Token cache location; `None` disables lookup and persistence.
	pub cache: Option<CacheConfig>,
	/// Skips the valid-cached-token shortcut.
	pub force_refresh: bool,
}

/// Where the returned tokens came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
	/// Unexpired cache entry, returned unchanged.
	Cache,
	/// Refresh token exchange.
	Refresh,
	/// Fresh grant.
	Grant,
}

/// Per-invocation result.
#[derive(Clone, Debug)]
pub struct Output {
	/// Tokens for the caller.
	pub token_set: TokenSet,
	/// ID token claims; verified unless the tokens came from the cache.
	pub claims: IdTokenClaims,
	/// Where the tokens came from.
	pub source: TokenSource,
	/// Persist failure reported as a warning.
	pub cache_error: Option<StoreError>,
}

/// Runs the authentication state machine against injected collaborators.
#[derive(Clone)]
pub struct Authentication {
	connector: Arc<dyn OidcConnector>,
	repository: Arc<dyn TokenCacheRepository>,
	interaction: Interaction,
	clock: Arc<dyn Clock>,
}
impl Authentication {
	/// Wires the orchestrator.
	pub fn new(
		connector: Arc<dyn OidcConnector>,
		repository: Arc<dyn TokenCacheRepository>,
		interaction: Interaction,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { connector, repository, interaction, clock }
	}

	/// Returns a usable token set for `input`.
	pub async fn run(&self, cancel: &CancellationToken, input: Input) -> Result<Output> {
		let Input { provider, grant_options, tls, cache, force_refresh } = input;
		let grant = grant_options.into_grant()?;
		let key = CacheKey::new(&provider, grant.username());
		let cached = match &cache {
			Some(config) => self.lookup(config, &key).await,
			None => None,
		};

		let fresh = cached
			.as_ref()
			.filter(|_| !force_refresh)
			.filter(|set| !set.is_expired_at(self.clock.now(), EXPIRY_SKEW));

		if let Some(token_set) = fresh {
			tracing::debug!("Using the cached token set.");

			return Ok(Output {
				claims: token_set.unverified_claims()?,
				token_set: token_set.clone(),
				source: TokenSource::Cache,
				cache_error: None,
			});
		}

		let client = common::cancellable(cancel, self.connector.connect(&provider, &tls)).await?;
		let refreshed = match cached.as_ref().and_then(|set| set.refresh_token.as_ref()) {
			Some(refresh_token) =>
				self.try_refresh(cancel, &provider, client.as_ref(), refresh_token.expose()).await?,
			None => None,
		};
		let (token_set, claims, source) = match refreshed {
			Some((token_set, claims)) => (token_set, claims, TokenSource::Refresh),
			None => {
				let output = self.grant(cancel, &grant, client.as_ref()).await?;
				let claims = self.validate(cancel, &provider, client.as_ref(), &output).await?;

				(output.token_set, claims, TokenSource::Grant)
			},
		};
		let cache_error = match &cache {
			Some(config) => self.persist(config, &key, &token_set).await,
			None => None,
		};

		Ok(Output { token_set, claims, source, cache_error })
	}

	async fn lookup(&self, config: &CacheConfig, key: &CacheKey) -> Option<TokenSet> {
		match self.repository.find_by_key(config, key).await {
			Ok(found) => found,
			Err(e) => {
				tracing::warn!(error = %e, "Could not read the token cache; treating it as a miss.");

				None
			},
		}
	}

	/// Refreshes and validates the new ID token. Yields `None` when either step failed for
	/// any reason other than cancellation.
	async fn try_refresh(
		&self,
		cancel: &CancellationToken,
		provider: &Provider,
		client: &dyn OidcClient,
		refresh_token: &str,
	) -> Result<Option<(TokenSet, IdTokenClaims)>> {
		let refreshed = obs::observe(FlowKind::Refresh, "refresh", async {
			let token_set = common::cancellable(cancel, client.refresh(refresh_token)).await?;
			let output = GrantOutput::without_nonce(token_set);
			let claims = self.validate(cancel, provider, client, &output).await?;

			Ok((output.token_set, claims))
		})
		.await;

		match refreshed {
			Ok(refreshed) => Ok(Some(refreshed)),
			Err(Error::Cancelled) => Err(Error::Cancelled),
			Err(e) => {
				tracing::info!(error = %e, "Refresh failed; falling back to the grant flow.");

				Ok(None)
			},
		}
	}

	async fn grant(
		&self,
		cancel: &CancellationToken,
		grant: &Grant,
		client: &dyn OidcClient,
	) -> Result<GrantOutput> {
		grant.run(cancel, client, &self.interaction).await
	}

	async fn validate(
		&self,
		cancel: &CancellationToken,
		provider: &Provider,
		client: &dyn OidcClient,
		output: &GrantOutput,
	) -> Result<IdTokenClaims> {
		let keys = common::cancellable(cancel, client.key_set()).await?;
		let audience = provider.audience.as_deref().unwrap_or(&provider.client_id);
		let validator =
			IdTokenValidator::new(provider.issuer_url.as_str(), audience, self.clock.clone());

		Ok(validator.validate(
			output.token_set.id_token.expose(),
			&keys,
			output.nonce.as_deref(),
		)?)
	}

	async fn persist(
		&self,
		config: &CacheConfig,
		key: &CacheKey,
		token_set: &TokenSet,
	) -> Option<StoreError> {
		match self.repository.save(config, key, token_set).await {
			Ok(()) => None,
			Err(e) => {
				tracing::warn!(
					error = %e,
					directory = %config.directory.display(),
					"Could not write the token cache; the token is still returned."
				);

				Some(e)
			},
		}
	}
}
impl Debug for Authentication {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Authentication(..)")
	}
}
