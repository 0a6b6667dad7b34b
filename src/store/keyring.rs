//! Operating system secret service backend.
//!
//! Secret services cannot enumerate entries, so the backend keeps the list of digests it
//! wrote under a dedicated index account and consults it when deleting everything.

// crates.io
use async_lock::Mutex as AsyncMutex;
use keyring::Entry;
// self
use crate::{
	_prelude::*,
	oidc::TokenSet,
	store::{StoreError, decode_entry, encode_entry},
};

const DEFAULT_SERVICE: &str = "kube-oidc-login";
const INDEX_ACCOUNT: &str = "index";

/// Blocking access to the secrets of one service.
pub(crate) trait Secrets
where
	Self: 'static + Debug + Send + Sync,
{
	fn get(&self, account: &str) -> keyring::Result<Option<String>>;

	fn set(&self, account: &str, secret: &str) -> keyring::Result<()>;

	/// Removing a missing secret succeeds.
	fn remove(&self, account: &str) -> keyring::Result<()>;
}

#[derive(Debug)]
struct OsSecrets {
	service: Arc<str>,
}
impl Secrets for OsSecrets {
	fn get(&self, account: &str) -> keyring::Result<Option<String>> {
		match Entry::new(&self.service, account)?.get_password() {
			Ok(secret) => Ok(Some(secret)),
			Err(keyring::Error::NoEntry) => Ok(None),
			Err(e) => Err(e),
		}
	}

	fn set(&self, account: &str, secret: &str) -> keyring::Result<()> {
		Entry::new(&self.service, account)?.set_password(secret)
	}

	fn remove(&self, account: &str) -> keyring::Result<()> {
		match Entry::new(&self.service, account)?.delete_credential() {
			Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
			Err(e) => Err(e),
		}
	}
}

/// Keyring-backed cache with one secret per cache key digest.
///
/// Clones share the index lock, so saves and cleanups through one repository never lose
/// an index update.
#[derive(Clone, Debug)]
pub struct KeyringStore {
	secrets: Arc<dyn Secrets>,
	index_lock: Arc<AsyncMutex<()>>,
}
impl KeyringStore {
	/// Creates a store writing under `service`.
	pub fn new(service: impl Into<Arc<str>>) -> Self {
		Self::with_secrets(Arc::new(OsSecrets { service: service.into() }))
	}

	pub(crate) fn with_secrets(secrets: Arc<dyn Secrets>) -> Self {
		Self { secrets, index_lock: Arc::new(AsyncMutex::new(())) }
	}

	/// Reads the secret stored for `digest`.
	pub async fn find(&self, digest: &str) -> Result<Option<TokenSet>, StoreError> {
		let secret = self.blocking(digest, |secrets, account| secrets.get(account)).await?;

		secret.map(|value| decode_entry(value.as_bytes())).transpose()
	}

	/// Stores `token_set` under `digest` and records the digest in the index.
	pub async fn save(&self, digest: &str, token_set: &TokenSet) -> Result<(), StoreError> {
		let payload = String::from_utf8(encode_entry(token_set)?).map_err(|e| {
			StoreError::Serialization { message: format!("Token set is not UTF-8: {e}") }
		})?;

		self.blocking(digest, move |secrets, account| secrets.set(account, &payload)).await?;

		let _index = self.index_lock.lock().await;
		let mut index = self.load_index().await?;

		if insert_digest(&mut index, digest) {
			let raw = encode_index(&index)?;

			self.blocking(INDEX_ACCOUNT, move |secrets, account| secrets.set(account, &raw))
				.await?;
		}

		Ok(())
	}

	/// Deletes every indexed secret and then the index itself.
	pub async fn delete_all(&self) -> Result<(), StoreError> {
		let _index = self.index_lock.lock().await;

		for digest in self.load_index().await? {
			self.blocking(&digest, |secrets, account| secrets.remove(account)).await?;
			tracing::debug!(digest = %digest, "Deleted keyring entry.");
		}

		self.blocking(INDEX_ACCOUNT, |secrets, account| secrets.remove(account)).await
	}

	async fn load_index(&self) -> Result<Vec<String>, StoreError> {
		match self.blocking(INDEX_ACCOUNT, |secrets, account| secrets.get(account)).await? {
			Some(raw) => decode_index(&raw),
			None => Ok(Vec::new()),
		}
	}

	async fn blocking<T, F>(&self, account: &str, op: F) -> Result<T, StoreError>
	where
		T: 'static + Send,
		F: 'static + Send + FnOnce(&dyn Secrets, &str) -> keyring::Result<T>,
	{
		let secrets = self.secrets.clone();
		let account = account.to_owned();

		tokio::task::spawn_blocking(move || {
			op(secrets.as_ref(), &account).map_err(|e| keyring_error(&account, e))
		})
		.await
		.map_err(|e| StoreError::Backend { message: format!("Keyring task failed: {e}") })?
	}
}
impl Default for KeyringStore {
	fn default() -> Self {
		Self::new(DEFAULT_SERVICE)
	}
}

fn keyring_error(account: &str, err: keyring::Error) -> StoreError {
	StoreError::Backend { message: format!("Keyring access for {account} failed: {err}") }
}

fn insert_digest(index: &mut Vec<String>, digest: &str) -> bool {
	if index.iter().any(|known| known == digest) {
		return false;
	}

	index.push(digest.to_owned());

	true
}

fn encode_index(index: &[String]) -> Result<String, StoreError> {
	serde_json::to_string(index).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode keyring index: {e}"),
	})
}

fn decode_index(raw: &str) -> Result<Vec<String>, StoreError> {
	serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
		message: format!("Failed to decode keyring index: {e}"),
	})
}
