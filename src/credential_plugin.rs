//! Kubernetes client-go credential plugin protocol and the `get-token` use case.
//!
//! `kubectl` passes the requested `client.authentication.k8s.io` version through
//! `KUBERNETES_EXEC_INFO` and reads one `ExecCredential` document from stdout.

// std
use std::io::Write;
// crates.io
use time::UtcOffset;
// self
use crate::{
	_prelude::*,
	authentication::{Authentication, Input},
	error::{ConfigError, TransportError},
};

/// Environment variable carrying the exec plugin request.
pub const EXEC_INFO_ENV: &str = "KUBERNETES_EXEC_INFO";

const KIND: &str = "ExecCredential";

/// Client authentication API versions the plugin can answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiVersion {
	/// `client.authentication.k8s.io/v1`.
	#[serde(rename = "client.authentication.k8s.io/v1")]
	V1,
	/// `client.authentication.k8s.io/v1beta1`; also chosen when no version is requested.
	#[serde(rename = "client.authentication.k8s.io/v1beta1")]
	V1Beta1,
}
impl ApiVersion {
	/// Full `apiVersion` string.
	pub const fn as_str(self) -> &'static str {
		match self {
			ApiVersion::V1 => "client.authentication.k8s.io/v1",
			ApiVersion::V1Beta1 => "client.authentication.k8s.io/v1beta1",
		}
	}
}
impl Display for ApiVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ApiVersion {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"client.authentication.k8s.io/v1" => Ok(Self::V1),
			"" | "client.authentication.k8s.io/v1beta1" => Ok(Self::V1Beta1),
			other => Err(ConfigError::UnknownApiVersion { value: other.to_owned() }),
		}
	}
}

/// `ExecCredential` document printed for `kubectl`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
	/// Always `ExecCredential`.
	pub kind: String,
	/// Requested API version.
	pub api_version: ApiVersion,
	/// Issued credential.
	pub status: ExecCredentialStatus,
}

/// Credential section of an [`ExecCredential`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
	/// Bearer token; the ID token.
	pub token: String,
	/// Instant after which `kubectl` runs the plugin again.
	#[serde(with = "time::serde::rfc3339")]
	pub expiration_timestamp: OffsetDateTime,
}
impl Debug for ExecCredentialStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExecCredentialStatus")
			.field("token", &"<redacted>")
			.field("expiration_timestamp", &self.expiration_timestamp)
			.finish()
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecInfo {
	#[serde(default)]
	api_version: String,
}

/// Builds the credential document for `api_version`.
///
/// An empty version selects `v1beta1`; the expiry is truncated to whole seconds in UTC.
pub fn generate_exec_credential(
	api_version: &str,
	token: &str,
	expiry: OffsetDateTime,
) -> Result<ExecCredential, ConfigError> {
	let api_version = api_version.parse::<ApiVersion>()?;
	let expiry = expiry.to_offset(UtcOffset::UTC);

	Ok(ExecCredential {
		kind: KIND.into(),
		api_version,
		status: ExecCredentialStatus {
			token: token.into(),
			expiration_timestamp: expiry.replace_nanosecond(0).unwrap_or(expiry),
		},
	})
}

/// Extracts the requested `apiVersion` from a `KUBERNETES_EXEC_INFO` payload.
///
/// A missing or empty payload requests the default version.
pub fn requested_api_version(exec_info: Option<&str>) -> Result<String, ConfigError> {
	let raw = match exec_info.map(str::trim) {
		Some(raw) if !raw.is_empty() => raw,
		_ => return Ok(String::new()),
	};
	let info: ExecInfo = serde_json::from_str(raw)
		.map_err(|e| ConfigError::InvalidExecInfo { reason: e.to_string() })?;

	Ok(info.api_version)
}

/// Writes `credential` as one JSON line.
pub fn write_exec_credential(mut writer: impl Write, credential: &ExecCredential) -> Result<()> {
	serde_json::to_writer(&mut writer, credential)
		.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
	writer.write_all(b"\n").and_then(|()| writer.flush()).map_err(TransportError::from)?;

	Ok(())
}

/// Input of [`GetToken::run`].
#[derive(Clone, Debug, Default)]
pub struct GetTokenInput {
	/// Orchestrator input.
	pub authentication: Input,
	/// Raw `KUBERNETES_EXEC_INFO` value.
	pub exec_info: Option<String>,
}

/// Credential plugin entry point.
#[derive(Clone, Debug)]
pub struct GetToken {
	authentication: Authentication,
}
impl GetToken {
	/// Creates the use case.
	pub fn new(authentication: Authentication) -> Self {
		Self { authentication }
	}

	/// Obtains a token and writes the matching `ExecCredential` to `out`.
	pub async fn run(
		&self,
		cancel: &CancellationToken,
		input: GetTokenInput,
		out: impl Write,
	) -> Result<()> {
		let api_version = requested_api_version(input.exec_info.as_deref())?;

		// Reject unsupported versions before any network call.
		api_version.parse::<ApiVersion>()?;

		let output = self.authentication.run(cancel, input.authentication).await?;
		let expiry = output.claims.expiry()?;
		let credential =
			generate_exec_credential(&api_version, output.token_set.id_token.expose(), expiry)?;

		tracing::debug!(source = ?output.source, expiry = %expiry, "Writing the credential.");

		write_exec_credential(out, &credential)
	}
}
