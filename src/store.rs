//! Token cache contracts and the disk, keyring, and in-memory backends.
//!
//! Exactly one entry exists per [`CacheKey`]; a save always replaces the whole [`TokenSet`].

pub mod disk;
pub mod keyring;
pub mod memory;

pub use disk::DiskStore;
pub use keyring::KeyringStore;
pub use memory::MemoryStore;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	oidc::{Provider, TokenSet},
};

/// Boxed future returned by cache implementations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for cached token sets.
pub trait TokenCacheRepository
where
	Self: Send + Sync,
{
	/// Looks up `key`; a missing entry is `Ok(None)`, not an error.
	fn find_by_key<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
	) -> StoreFuture<'a, Option<TokenSet>>;

	/// Replaces the entry for `key` atomically.
	fn save<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
		token_set: &'a TokenSet,
	) -> StoreFuture<'a, ()>;

	/// Removes every entry of `config.storage` under `config.directory`.
	fn delete_all<'a>(&'a self, config: &'a CacheConfig) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenCacheRepository`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Entry could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Where cached token sets live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Storage {
	/// One JSON file per key under the cache directory.
	#[default]
	Disk,
	/// The operating system secret service.
	Keyring,
}
impl Storage {
	/// Returns the flag value for this storage kind.
	pub const fn as_str(self) -> &'static str {
		match self {
			Storage::Disk => "disk",
			Storage::Keyring => "keyring",
		}
	}
}
impl Display for Storage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Storage {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"disk" => Ok(Storage::Disk),
			"keyring" => Ok(Storage::Keyring),
			other => Err(ConfigError::UnknownStorage { value: other.to_owned() }),
		}
	}
}

/// Cache location and backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
	/// Cache directory; also namespaces in-memory entries.
	pub directory: PathBuf,
	/// Backend kind.
	pub storage: Storage,
}

/// Identity a cache entry belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// Issuer URL.
	pub issuer: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Requested audience, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audience: Option<String>,
	/// Extra scopes, sorted and deduplicated.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub extra_scopes: Vec<String>,
	/// Username of the password grant, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
}
impl CacheKey {
	/// Derives the key for `provider`, optionally scoped to a password-grant `username`.
	pub fn new(provider: &Provider, username: Option<&str>) -> Self {
		let mut extra_scopes = provider.extra_scopes.clone();

		extra_scopes.sort();
		extra_scopes.dedup();

		Self {
			issuer: provider.issuer_url.clone(),
			client_id: provider.client_id.clone(),
			audience: provider.audience.clone(),
			extra_scopes,
			username: username.map(str::to_owned),
		}
	}

	/// Stable entry name: base64url(SHA-256(JSON(key))).
	pub fn digest(&self) -> Result<String, StoreError> {
		let json = serde_json::to_vec(self).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode cache key: {e}"),
		})?;

		Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(&json)))
	}
}

/// Repository dispatching to the disk or keyring backend named by [`CacheConfig::storage`].
#[derive(Clone, Debug, Default)]
pub struct Repository {
	disk: DiskStore,
	keyring: KeyringStore,
}
impl Repository {
	/// Creates a repository with custom backends.
	pub fn new(disk: DiskStore, keyring: KeyringStore) -> Self {
		Self { disk, keyring }
	}
}
impl TokenCacheRepository for Repository {
	fn find_by_key<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
	) -> StoreFuture<'a, Option<TokenSet>> {
		Box::pin(async move {
			let digest = key.digest()?;

			match config.storage {
				Storage::Disk => self.disk.find(&config.directory, &digest),
				Storage::Keyring => self.keyring.find(&digest).await,
			}
		})
	}

	fn save<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
		token_set: &'a TokenSet,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let digest = key.digest()?;

			match config.storage {
				Storage::Disk => self.disk.save(&config.directory, &digest, token_set),
				Storage::Keyring => self.keyring.save(&digest, token_set).await,
			}
		})
	}

	fn delete_all<'a>(&'a self, config: &'a CacheConfig) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			match config.storage {
				Storage::Disk => self.disk.delete_all(&config.directory),
				Storage::Keyring => self.keyring.delete_all().await,
			}
		})
	}
}

fn encode_entry(token_set: &TokenSet) -> Result<Vec<u8>, StoreError> {
	serde_json::to_vec(token_set).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode token set: {e}"),
	})
}

fn decode_entry(bytes: &[u8]) -> Result<TokenSet, StoreError> {
	serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
		message: format!("Failed to decode token set: {e}"),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn provider(scopes: &[&str]) -> Provider {
		Provider {
			issuer_url: "https://issuer.example.com".into(),
			client_id: "kubernetes".into(),
			extra_scopes: scopes.iter().map(|s| s.to_string()).collect(),
			..Default::default()
		}
	}

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unreachable"));

		let source = StdError::source(&error).expect("Error should expose the store error.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn storage_parses_known_values_only() {
		assert_eq!("disk".parse::<Storage>().ok(), Some(Storage::Disk));
		assert_eq!("keyring".parse::<Storage>().ok(), Some(Storage::Keyring));

		let err = "s3".parse::<Storage>().expect_err("Unknown storage must be rejected.");

		assert!(err.to_string().contains("s3"));
	}

	#[test]
	fn digest_ignores_scope_order_but_not_identity() {
		let a = CacheKey::new(&provider(&["groups", "email"]), None);
		let b = CacheKey::new(&provider(&["email", "groups", "email"]), None);
		let c = CacheKey::new(&provider(&["email", "groups"]), Some("alice"));

		assert_eq!(a.digest(), b.digest());
		assert_ne!(a.digest(), c.digest());

		let digest = a.digest().expect("Digest should compute.");

		assert_eq!(digest.len(), 43);
		assert!(!digest.contains(['/', '+', '=']));
	}
}
