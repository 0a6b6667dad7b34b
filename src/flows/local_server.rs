//! Ephemeral loopback listener receiving the authorization redirect.
//!
//! The listener lives in a background task that resolves a single oneshot with the first
//! callback, listener failure, or nothing at all when the flow is cancelled. Dropping the
//! [`CallbackServer`] shuts the task down, so the port is released on every exit path.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	extract::{Query, State},
	http::StatusCode,
	response::{Html, IntoResponse, Response},
	routing::get,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError, ValidationError},
};

const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Authenticated</title></head>\
<body><p>Authenticated. You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Authentication failed</title></head>\
<body><p>Authentication failed. Check the terminal for details.</p></body></html>";

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>;

#[derive(Clone)]
struct CallbackState {
	expected_state: Arc<str>,
	sender: CallbackSender,
}

/// Running redirect listener.
#[derive(Debug)]
pub(crate) struct CallbackServer {
	local_addr: SocketAddr,
	receiver: oneshot::Receiver<Result<String>>,
	shutdown: CancellationToken,
	task: JoinHandle<()>,
}
impl CallbackServer {
	/// Binds the first available address in `addresses` and starts serving.
	///
	/// The callback must echo `expected_state`; the resolved value is the authorization code.
	pub(crate) async fn start(addresses: &[String], expected_state: &str) -> Result<Self> {
		let listener = bind_first(addresses).await?;
		let local_addr = listener.local_addr().map_err(TransportError::from)?;
		let (sender, receiver) = oneshot::channel();
		let sender: CallbackSender = Arc::new(Mutex::new(Some(sender)));
		let state = CallbackState { expected_state: expected_state.into(), sender: sender.clone() };
		let router = Router::new().route("/", get(handle_callback)).with_state(state);
		let shutdown = CancellationToken::new();
		let task = tokio::spawn({
			let shutdown = shutdown.clone();

			async move {
				let served = axum::serve(listener, router)
					.with_graceful_shutdown(shutdown.cancelled_owned())
					.await;

				if let Err(e) = served {
					resolve(&sender, Err(TransportError::Io(e).into()));
				}
			}
		});

		tracing::debug!(address = %local_addr, "Redirect listener started.");

		Ok(Self { local_addr, receiver, shutdown, task })
	}

	/// Port the listener is bound to.
	pub(crate) fn port(&self) -> u16 {
		self.local_addr.port()
	}

	/// Waits for the authorization code.
	pub(crate) async fn wait(&mut self) -> Result<String> {
		match (&mut self.receiver).await {
			Ok(result) => result,
			Err(_) => Err(TransportError::Io(std::io::Error::other(
				"redirect listener stopped before receiving a callback",
			))
			.into()),
		}
	}
}
impl Drop for CallbackServer {
	fn drop(&mut self) {
		self.shutdown.cancel();
		self.task.abort();
	}
}

async fn bind_first(addresses: &[String]) -> Result<TcpListener> {
	for address in addresses {
		match TcpListener::bind(address.as_str()).await {
			Ok(listener) => return Ok(listener),
			Err(e) => tracing::debug!(address = %address, error = %e, "Could not bind address."),
		}
	}

	Err(ConfigError::NoBindableAddress { addresses: addresses.to_vec() }.into())
}

async fn handle_callback(
	State(state): State<CallbackState>,
	Query(params): Query<HashMap<String, String>>,
) -> Response {
	if let Some(code) = params.get("error") {
		let description = params.get("error_description").cloned().unwrap_or_else(|| code.clone());

		resolve(&state.sender, Err(Error::Provider { code: code.clone(), description }));

		return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response();
	}
	if params.get("state").map(String::as_str) != Some(&*state.expected_state) {
		resolve(&state.sender, Err(ValidationError::StateMismatch.into()));

		return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response();
	}

	match params.get("code") {
		Some(code) => {
			resolve(&state.sender, Ok(code.clone()));

			Html(SUCCESS_PAGE).into_response()
		},
		None => {
			resolve(&state.sender, Err(ValidationError::MissingAuthorizationCode.into()));

			(StatusCode::BAD_REQUEST, Html(FAILURE_PAGE)).into_response()
		},
	}
}

fn resolve(sender: &CallbackSender, result: Result<String>) {
	if let Some(sender) = sender.lock().take() {
		let _ = sender.send(result);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	async fn get(port: u16, query: &str) -> reqwest::Response {
		reqwest::get(format!("http://127.0.0.1:{port}/{query}"))
			.await
			.expect("Loopback request should succeed.")
	}

	#[tokio::test]
	async fn callback_resolves_code_and_rejects_other_paths() {
		let mut server = CallbackServer::start(&["127.0.0.1:0".into()], "expected")
			.await
			.expect("Listener should bind.");
		let port = server.port();

		assert_eq!(get(port, "favicon.ico").await.status(), 404);

		let response = get(port, "?code=abc&state=expected").await;

		assert_eq!(response.status(), 200);
		assert!(response.text().await.expect("Body should read.").contains("Authenticated"));
		assert_eq!(server.wait().await.expect("Code should resolve."), "abc");
	}

	#[tokio::test]
	async fn state_mismatch_and_provider_errors_fail_the_wait() {
		let mut server = CallbackServer::start(&["127.0.0.1:0".into()], "expected")
			.await
			.expect("Listener should bind.");

		assert_eq!(get(server.port(), "?code=abc&state=forged").await.status(), 400);
		assert!(matches!(
			server.wait().await,
			Err(Error::Validation(ValidationError::StateMismatch))
		));

		let mut server = CallbackServer::start(&["127.0.0.1:0".into()], "expected")
			.await
			.expect("Listener should bind.");

		get(server.port(), "?error=access_denied&error_description=denied").await;

		match server.wait().await {
			Err(Error::Provider { code, description }) => {
				assert_eq!(code, "access_denied");
				assert_eq!(description, "denied");
			},
			other => panic!("Unexpected callback result: {other:?}"),
		}

		let mut server = CallbackServer::start(&["127.0.0.1:0".into()], "expected")
			.await
			.expect("Listener should bind.");

		assert_eq!(get(server.port(), "?state=expected").await.status(), 400);
		assert!(matches!(
			server.wait().await,
			Err(Error::Validation(ValidationError::MissingAuthorizationCode))
		));
	}

	#[tokio::test]
	async fn falls_back_to_the_next_bindable_address() {
		let occupied = TcpListener::bind("127.0.0.1:0").await.expect("Fixture should bind.");
		let taken = occupied.local_addr().expect("Fixture address should resolve.").to_string();
		let server = CallbackServer::start(&[taken.clone(), "127.0.0.1:0".into()], "s")
			.await
			.expect("Second address should bind.");
		let port = server.port();

		assert_ne!(taken, format!("127.0.0.1:{port}"));

		drop(server);

		let err = CallbackServer::start(&[taken], "s").await.expect_err("Occupied port must fail.");

		assert!(matches!(err, Error::Config(ConfigError::NoBindableAddress { .. })));
	}
}
