//! TLS trust settings for talking to the identity provider.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, error::ConfigError};

/// Extra trust roots and verification switches applied to the provider HTTP client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsClientConfig {
	/// PEM files holding additional CA certificates.
	pub ca_cert_files: Vec<PathBuf>,
	/// Base64-encoded PEM bundles, as found in `certificate-authority-data`.
	pub ca_cert_data: Vec<String>,
	/// Disables certificate verification entirely.
	pub skip_verify: bool,
}
impl TlsClientConfig {
	/// Reads every configured root into raw PEM bytes.
	pub fn load_root_certificates(&self) -> Result<Vec<Vec<u8>>, ConfigError> {
		let mut roots = Vec::with_capacity(self.ca_cert_files.len() + self.ca_cert_data.len());

		for path in &self.ca_cert_files {
			let pem = std::fs::read(path).map_err(|e| ConfigError::TlsMaterial {
				origin: path.display().to_string(),
				reason: e.to_string(),
			})?;

			roots.push(pem);
		}
		for data in &self.ca_cert_data {
			let pem = STANDARD.decode(data.trim()).map_err(|e| ConfigError::TlsMaterial {
				origin: "certificate-authority-data".into(),
				reason: e.to_string(),
			})?;

			roots.push(pem);
		}

		Ok(roots)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decodes_inline_authority_data() {
		let config = TlsClientConfig {
			ca_cert_data: vec![STANDARD.encode(b"-----BEGIN CERTIFICATE-----")],
			..Default::default()
		};
		let roots = config.load_root_certificates().expect("Inline data should decode.");

		assert_eq!(roots, vec![b"-----BEGIN CERTIFICATE-----".to_vec()]);
	}

	#[test]
	fn missing_file_names_the_path() {
		let config = TlsClientConfig {
			ca_cert_files: vec![PathBuf::from("/nonexistent/ca.pem")],
			..Default::default()
		};
		let err = config.load_root_certificates().expect_err("Missing file should fail.");

		assert!(err.to_string().contains("/nonexistent/ca.pem"));
	}
}
