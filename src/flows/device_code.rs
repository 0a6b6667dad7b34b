//! Device authorization grant (RFC 8628).
//!
//! Polling is the only protocol-mandated retry in the crate: `authorization_pending` keeps the
//! interval, `slow_down` lengthens it by five seconds, and `expires_in` bounds the loop.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	flows::common,
	interaction::Browser,
	oidc::{DevicePoll, OidcClient, TokenSet},
};

const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(5);
const SLOW_DOWN_STEP: StdDuration = StdDuration::from_secs(5);
/// Upper bound for provider-supplied `expires_in` and `interval`, keeping instant arithmetic
/// in range.
const MAX_WAIT: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// Inputs of the device authorization grant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCodeOption {
	/// Prints the verification URI without launching a browser.
	pub skip_open_browser: bool,
}

/// Requests a device code, shows it to the operator, and polls until tokens are issued.
pub async fn run(
	cancel: &CancellationToken,
	option: &DeviceCodeOption,
	client: &dyn OidcClient,
	browser: &dyn Browser,
) -> Result<TokenSet> {
	let authorization = common::cancellable(cancel, client.request_device_authorization())
		.await
		.map_err(Error::authorization)?;
	let target = authorization
		.verification_uri_complete
		.as_deref()
		.unwrap_or(&authorization.verification_uri);

	tracing::info!(
		"Open {} and enter the code {} to authenticate.",
		authorization.verification_uri,
		authorization.user_code
	);

	if !option.skip_open_browser {
		match Url::parse(target) {
			Ok(url) => common::open_browser(browser, &url),
			Err(e) => tracing::warn!(uri = %target, error = %e, "Verification URI is not a URL."),
		}
	}

	let deadline = Instant::now() + StdDuration::from_secs(authorization.expires_in).min(MAX_WAIT);
	let mut interval = authorization
		.interval
		.filter(|secs| *secs > 0)
		.map(|secs| StdDuration::from_secs(secs).min(MAX_WAIT))
		.unwrap_or(DEFAULT_INTERVAL);

	loop {
		if Instant::now() + interval > deadline {
			return Err(Error::authorization(Error::InvalidGrant {
				reason: "device code expired before the authorization completed".into(),
			}));
		}

		common::sleep(cancel, interval).await?;

		let poll = common::cancellable(
			cancel,
			client.poll_device_token(authorization.device_code.expose()),
		)
		.await
		.map_err(Error::authorization)?;

		match poll {
			DevicePoll::Pending => (),
			DevicePoll::SlowDown => {
				interval = (interval + SLOW_DOWN_STEP).min(MAX_WAIT);

				tracing::debug!(interval_secs = interval.as_secs(), "Provider asked to slow down.");
			},
			DevicePoll::Complete(token_set) => return Ok(token_set),
		}
	}
}
