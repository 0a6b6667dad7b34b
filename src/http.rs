//! Transport primitives for calls to the identity provider.
//!
//! [`TokenHttpClient`] is the only seam between the OIDC client and an HTTP stack. Every
//! handle carries a [`ResponseMetadataSlot`] so error mapping can read the status code and
//! `Retry-After` hint of the response that failed, regardless of which endpoint was called.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	Certificate,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError, tls::TlsClientConfig};

/// Abstraction over HTTP transports that publish response metadata for error mapping.
///
/// Implementations must be `Send + Sync + 'static`, and the handles they return must own
/// whatever state they need so request futures stay `Send` for the whole exchange.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Transport error type.
	type TransportError: 'static + Send + Sync + StdError;

	/// Reqwest client paired with the slot it reports into.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Handle for one token request; the response status lands in `slot`.
	///
	/// Handles call [`ResponseMetadataSlot::take`] before each request and
	/// [`ResponseMetadataSlot::store`] once a status is known.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and `Retry-After` of the last token endpoint response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
	/// `Retry-After`, relative to now.
	pub retry_after: Option<Duration>,
}

/// Shared cell the transport writes and the OIDC client reads after an exchange.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Records metadata for the in-flight request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Takes the recorded metadata out of the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// [`TokenHttpClient`] backed by reqwest.
///
/// Provider endpoints answer directly, so clients built here never follow redirects.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(ReqwestClient);
impl ReqwestHttpClient {
	/// Builds a client that trusts the extra roots (or skips verification) in `tls`.
	pub fn from_tls_config(tls: &TlsClientConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.redirect(Policy::none())
			.user_agent(concat!("kube-oidc-login/", env!("CARGO_PKG_VERSION")));

		for certificate in root_certificates(tls)? {
			builder = builder.add_root_certificate(certificate);
		}
		if tls.skip_verify {
			tracing::warn!("TLS certificate verification is disabled for the provider.");

			builder = builder.danger_accept_invalid_certs(true);
		}

		Ok(Self(builder.build()?))
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle(Arc::new(Instrumented { client: self.0.clone(), slot }))
	}
}

/// Every certificate of every configured bundle.
fn root_certificates(tls: &TlsClientConfig) -> Result<Vec<Certificate>, ConfigError> {
	let mut certificates = Vec::new();

	for pem in tls.load_root_certificates()? {
		certificates.extend(Certificate::from_pem_bundle(&pem)?);
	}

	Ok(certificates)
}

struct Instrumented {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Per-request reqwest handle that records response metadata.
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<Instrumented>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let handle = Arc::clone(&self.0);

		Box::pin(async move {
			handle.slot.take();

			let request: reqwest::Request = request.try_into().map_err(Box::new)?;
			let response = handle.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			handle.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers),
			});

			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
