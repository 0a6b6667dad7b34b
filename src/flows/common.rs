//! Shared helpers for grant strategies (cancellation, per-attempt secrets, state checks).

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	error::ValidationError,
	interaction::Browser,
	oidc::{AuthorizationRequest, OidcClient},
	pkce,
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;

/// Races `fut` against `cancel`, yielding [`Error::Cancelled`] when the token fires first.
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::Cancelled),
		result = fut => result,
	}
}

/// Sleeps for `duration` unless `cancel` fires first.
pub async fn sleep(cancel: &CancellationToken, duration: std::time::Duration) -> Result<()> {
	cancellable(cancel, async {
		tokio::time::sleep(duration).await;

		Ok(())
	})
	.await
}

/// Secrets bound to one authorization code attempt.
#[derive(Clone)]
pub struct AuthorizationAttempt {
	/// Anti-CSRF value that must round-trip via the redirect.
	pub state: String,
	/// Nonce the ID token must echo.
	pub nonce: String,
	/// PKCE parameters negotiated with the provider.
	pub pkce: pkce::Params,
}
impl AuthorizationAttempt {
	/// Generates fresh state, nonce, and PKCE parameters for `client`.
	pub fn generate(client: &dyn OidcClient) -> Result<Self> {
		Ok(Self {
			state: random_string(STATE_LEN),
			nonce: random_string(NONCE_LEN),
			pkce: pkce::Params::new(client.supported_pkce_method())?,
		})
	}

	/// Builds the authorization URL for `redirect_uri`.
	pub fn authorization_url(
		&self,
		client: &dyn OidcClient,
		redirect_uri: &str,
		extra_params: &[(String, String)],
	) -> Url {
		client.authorization_url(&AuthorizationRequest {
			redirect_uri,
			state: &self.state,
			nonce: &self.nonce,
			pkce: &self.pkce,
			extra_params,
		})
	}

	/// Validates the `state` returned with the authorization code.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<(), ValidationError> {
		if returned_state == Some(self.state.as_str()) {
			Ok(())
		} else {
			Err(ValidationError::StateMismatch)
		}
	}
}
impl Debug for AuthorizationAttempt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationAttempt")
			.field("state", &self.state)
			.field("nonce", &self.nonce)
			.field("pkce", &self.pkce)
			.finish()
	}
}

/// Launches `url`; failures only warn since the URL has already been logged.
pub fn open_browser(browser: &dyn Browser, url: &Url) {
	if let Err(e) = browser.open(url) {
		tracing::warn!(error = %e, "Could not open the browser; open the URL manually.");
	}
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
