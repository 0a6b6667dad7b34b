//! Token cache cleanup over both storage kinds.

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind},
	store::{CacheConfig, Storage, TokenCacheRepository},
};

/// Deletes cached tokens from the disk and keyring backends.
#[derive(Clone)]
pub struct Clean {
	repository: Arc<dyn TokenCacheRepository>,
}
impl Clean {
	/// Creates the use case over `repository`.
	pub fn new(repository: Arc<dyn TokenCacheRepository>) -> Self {
		Self { repository }
	}

	/// Deletes every entry under `directory` from both backends.
	///
	/// Both deletions always run. A disk failure fails the call and names the directory; a
	/// keyring failure is only logged, since headless hosts often have no secret service.
	pub async fn run(&self, directory: &Path) -> Result<()> {
		obs::observe(FlowKind::Clean, "clean", async {
			let disk = CacheConfig { directory: directory.to_path_buf(), storage: Storage::Disk };
			let keyring = CacheConfig { storage: Storage::Keyring, ..disk.clone() };
			let disk_result = self.repository.delete_all(&disk).await;

			match self.repository.delete_all(&keyring).await {
				Ok(()) => tracing::info!("Deleted the token cache from the keyring."),
				Err(e) => {
					tracing::warn!(error = %e, "Could not delete the token cache from the keyring.")
				},
			}

			disk_result.map_err(|source| Error::Cleanup {
				directory: directory.display().to_string(),
				source,
			})?;

			tracing::info!(directory = %directory.display(), "Deleted the token cache.");

			Ok(())
		})
		.await
	}
}
impl Debug for Clean {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Clean(..)")
	}
}
