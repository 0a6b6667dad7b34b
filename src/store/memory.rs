//! Thread-safe in-memory [`TokenCacheRepository`] for tests and embedding.

// self
use crate::{
	_prelude::*,
	oidc::TokenSet,
	store::{CacheConfig, CacheKey, StoreError, StoreFuture, TokenCacheRepository},
};

type StoreMap = Arc<RwLock<HashMap<(PathBuf, CacheKey), TokenSet>>>;

/// Process-local cache keyed by directory and [`CacheKey`].
///
/// [`CacheConfig::storage`] is ignored; both storage kinds share one map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: StoreMap,
	fail_writes: Arc<RwLock<Option<String>>>,
}
impl MemoryStore {
	/// Makes every subsequent `save` and `delete_all` fail with `message`.
	pub fn fail_writes(&self, message: impl Into<String>) {
		*self.fail_writes.write() = Some(message.into());
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn check_writable(&self) -> Result<(), StoreError> {
		match self.fail_writes.read().as_ref() {
			Some(message) => Err(StoreError::Backend { message: message.clone() }),
			None => Ok(()),
		}
	}
}
impl TokenCacheRepository for MemoryStore {
	fn find_by_key<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
	) -> StoreFuture<'a, Option<TokenSet>> {
		let found = self.entries.read().get(&(config.directory.clone(), key.clone())).cloned();

		Box::pin(async move { Ok(found) })
	}

	fn save<'a>(
		&'a self,
		config: &'a CacheConfig,
		key: &'a CacheKey,
		token_set: &'a TokenSet,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.check_writable()?;
			self.entries
				.write()
				.insert((config.directory.clone(), key.clone()), token_set.clone());

			Ok(())
		})
	}

	fn delete_all<'a>(&'a self, config: &'a CacheConfig) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.check_writable()?;
			self.entries.write().retain(|(directory, _), _| directory != &config.directory);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn key(client_id: &str) -> CacheKey {
		CacheKey {
			issuer: "https://issuer.example.com".into(),
			client_id: client_id.into(),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn entries_are_scoped_by_directory() {
		let store = MemoryStore::default();
		let a = CacheConfig { directory: "/tmp/a".into(), ..Default::default() };
		let b = CacheConfig { directory: "/tmp/b".into(), ..Default::default() };
		let tokens = TokenSet::new("id", "access");

		store.save(&a, &key("one"), &tokens).await.expect("Save should succeed.");
		store.save(&b, &key("one"), &tokens).await.expect("Save should succeed.");

		assert_eq!(
			store.find_by_key(&a, &key("one")).await.expect("Lookup should succeed."),
			Some(tokens.clone())
		);
		assert_eq!(store.find_by_key(&a, &key("two")).await.expect("Lookup should succeed."), None);

		store.delete_all(&a).await.expect("Cleanup should succeed.");

		assert_eq!(store.find_by_key(&a, &key("one")).await.expect("Lookup should succeed."), None);
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn injected_write_failures_surface_as_backend_errors() {
		let store = MemoryStore::default();
		let config = CacheConfig::default();

		store.fail_writes("read-only");

		let err = store
			.save(&config, &key("one"), &TokenSet::new("id", "access"))
			.await
			.expect_err("Save should fail.");

		assert_eq!(err, StoreError::Backend { message: "read-only".into() });
		assert!(store.is_empty());
	}
}
