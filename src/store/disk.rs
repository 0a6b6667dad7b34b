//! One JSON file per cache key, replaced atomically.

// std
use std::{
	fs,
	io::{ErrorKind, Write},
};
// crates.io
use tempfile::Builder;
// self
use crate::{
	_prelude::*,
	oidc::TokenSet,
	store::{StoreError, decode_entry, encode_entry},
};

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".entry-";

/// File-per-key backend.
///
/// Writers go through a temporary file in the same directory followed by a rename, so
/// concurrent `kubectl` processes never observe a partially written entry.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskStore;
impl DiskStore {
	/// Path of the entry for `digest`.
	pub fn entry_path(directory: &Path, digest: &str) -> PathBuf {
		directory.join(format!("{digest}.{ENTRY_EXTENSION}"))
	}

	/// Reads the entry for `digest`, if present.
	pub fn find(&self, directory: &Path, digest: &str) -> Result<Option<TokenSet>, StoreError> {
		let path = Self::entry_path(directory, digest);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(backend(format!("Failed to read {}: {e}", path.display()))),
		};

		decode_entry(&bytes).map(Some)
	}

	/// Writes the entry for `digest`, replacing any previous one.
	pub fn save(&self, directory: &Path, digest: &str, token_set: &TokenSet) -> Result<(), StoreError> {
		let payload = encode_entry(token_set)?;

		ensure_directory(directory)?;

		let mut file = Builder::new().prefix(TEMP_PREFIX).tempfile_in(directory).map_err(|e| {
			backend(format!("Failed to create a temporary file in {}: {e}", directory.display()))
		})?;

		file.write_all(&payload)
			.and_then(|()| file.as_file().sync_all())
			.map_err(|e| backend(format!("Failed to write {}: {e}", file.path().display())))?;

		let path = Self::entry_path(directory, digest);

		file.persist(&path)
			.map_err(|e| backend(format!("Failed to replace {}: {}", path.display(), e.error)))?;

		Ok(())
	}

	/// Removes every entry under `directory`, including temporary files an interrupted save
	/// left behind, then the directory itself once empty.
	///
	/// A missing directory is already clean.
	pub fn delete_all(&self, directory: &Path) -> Result<(), StoreError> {
		let entries = match fs::read_dir(directory) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
			Err(e) =>
				return Err(backend(format!("Failed to list {}: {e}", directory.display()))),
		};

		for entry in entries {
			let path = entry
				.map_err(|e| backend(format!("Failed to list {}: {e}", directory.display())))?
				.path();

			if !is_cache_file(&path) {
				continue;
			}

			match fs::remove_file(&path) {
				Ok(()) => tracing::debug!(path = %path.display(), "Deleted cache entry."),
				Err(e) if e.kind() == ErrorKind::NotFound => (),
				Err(e) =>
					return Err(backend(format!("Failed to delete {}: {e}", path.display()))),
			}
		}

		let is_empty = fs::read_dir(directory)
			.map(|mut rest| rest.next().is_none())
			.map_err(|e| backend(format!("Failed to list {}: {e}", directory.display())))?;

		if is_empty {
			match fs::remove_dir(directory) {
				Ok(()) => (),
				Err(e) if e.kind() == ErrorKind::NotFound => (),
				Err(e) =>
					return Err(backend(format!(
						"Failed to remove {}: {e}",
						directory.display()
					))),
			}
		}

		Ok(())
	}
}

fn is_cache_file(path: &Path) -> bool {
	let is_entry = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
	let is_leftover = path
		.file_name()
		.and_then(|name| name.to_str())
		.is_some_and(|name| name.starts_with(TEMP_PREFIX));

	is_entry || is_leftover
}

fn ensure_directory(directory: &Path) -> Result<(), StoreError> {
	let mut builder = fs::DirBuilder::new();

	builder.recursive(true);

	#[cfg(unix)]
	{
		use std::os::unix::fs::DirBuilderExt;

		builder.mode(0o700);
	}

	builder
		.create(directory)
		.map_err(|e| backend(format!("Failed to create {}: {e}", directory.display())))
}

fn backend(message: String) -> StoreError {
	StoreError::Backend { message }
}
