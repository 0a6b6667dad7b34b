//! Client credentials grant: one request, no operator interaction, no local state.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::common,
	oidc::{ClientCredentialsInput, OidcClient, TokenSet},
};

/// Requests tokens for the client itself.
///
/// A missing `input` is rejected before any network call; provider and transport failures
/// are wrapped with the `authorization error` context.
pub async fn run(
	cancel: &CancellationToken,
	input: Option<&ClientCredentialsInput>,
	client: &dyn OidcClient,
) -> Result<TokenSet> {
	let input = input.ok_or(ConfigError::MissingGrantInput { grant: "client_credentials" })?;

	common::cancellable(cancel, client.exchange_client_credentials(input))
		.await
		.map_err(Error::authorization)
}
