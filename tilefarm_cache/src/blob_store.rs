//! Durable storage for rendered tile bytes, addressed by the canonical object-store
//! layout `tiles/<layer>/<period>/<year>[/<month>]/<visparam>/<z>/<x>/<y>.png` (spec §4.4).

use async_trait::async_trait;
use std::path::PathBuf;
use tilefarm_core::Blob;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Object-store interface for rendered tiles. Implementations need only honour the
/// path as an opaque key; `FsBlobStore` happens to mirror it onto a real filesystem
/// tree, but a swappable S3/GCS-backed store would satisfy the same contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// Reads the blob at `path`, if present.
	async fn get(&self, path: &str) -> anyhow::Result<Option<Blob>>;

	/// Writes `blob` at `path`, creating any intermediate structure the backend needs.
	async fn put(&self, path: &str, blob: Blob) -> anyhow::Result<()>;

	/// Whether a blob exists at `path`, without reading its contents.
	async fn exists(&self, path: &str) -> anyhow::Result<bool>;

	/// Deletes every blob whose path starts with `prefix` (spec §4.11 admin invalidation).
	async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<()>;
}

/// Filesystem-backed reference implementation: `path` is joined onto `root` verbatim,
/// so the on-disk tree is a direct mirror of the canonical blob path.
pub struct FsBlobStore {
	root: PathBuf,
}

impl FsBlobStore {
	#[must_use]
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn resolve(&self, path: &str) -> PathBuf {
		self.root.join(path)
	}
}

#[async_trait]
impl BlobStore for FsBlobStore {
	async fn get(&self, path: &str) -> anyhow::Result<Option<Blob>> {
		let full = self.resolve(path);
		match fs::read(&full).await {
			Ok(bytes) => Ok(Some(Blob::from(bytes))),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	async fn put(&self, path: &str, blob: Blob) -> anyhow::Result<()> {
		let full = self.resolve(path);
		if let Some(parent) = full.parent() {
			fs::create_dir_all(parent).await?;
		}

		let tmp = full.with_extension("tmp");
		let mut file = fs::File::create(&tmp).await?;
		file.write_all(blob.as_slice()).await?;
		file.flush().await?;
		drop(file);
		fs::rename(&tmp, &full).await?;
		Ok(())
	}

	async fn exists(&self, path: &str) -> anyhow::Result<bool> {
		Ok(fs::metadata(self.resolve(path)).await.is_ok())
	}

	async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<()> {
		let full = self.resolve(prefix);
		match fs::remove_dir_all(&full).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(err) if full.is_file() || full.extension().is_some() => {
				// `prefix` names a file, not a directory (e.g. a single tile path).
				match fs::remove_file(&full).await {
					Ok(()) => Ok(()),
					Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
					Err(err) => Err(err.into()),
				}
			}
			Err(err) => Err(err.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;

	#[tokio::test]
	async fn put_then_get_round_trips() {
		let dir = tempdir().unwrap();
		let store = FsBlobStore::new(dir.path());
		store.put("tiles/s2_harmonized/WET/2023/tvi-red/10/5/5.png", Blob::from(b"pngbytes".to_vec())).await.unwrap();

		let got = store.get("tiles/s2_harmonized/WET/2023/tvi-red/10/5/5.png").await.unwrap();
		assert_eq!(got.unwrap().as_slice(), b"pngbytes");
	}

	#[tokio::test]
	async fn get_of_missing_path_is_none() {
		let dir = tempdir().unwrap();
		let store = FsBlobStore::new(dir.path());
		assert!(store.get("tiles/nope.png").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn exists_reflects_presence() {
		let dir = tempdir().unwrap();
		let store = FsBlobStore::new(dir.path());
		assert!(!store.exists("tiles/a.png").await.unwrap());
		store.put("tiles/a.png", Blob::from(b"x".to_vec())).await.unwrap();
		assert!(store.exists("tiles/a.png").await.unwrap());
	}

	#[tokio::test]
	async fn delete_prefix_removes_whole_subtree() {
		let dir = tempdir().unwrap();
		let store = FsBlobStore::new(dir.path());
		store.put("tiles/s2_harmonized/WET/2023/tvi-red/10/5/5.png", Blob::from(b"a".to_vec())).await.unwrap();
		store.put("tiles/s2_harmonized/WET/2023/tvi-red/10/5/6.png", Blob::from(b"b".to_vec())).await.unwrap();
		store.put("tiles/landsat/DRY/1990/tvi-ndvi/10/5/5.png", Blob::from(b"c".to_vec())).await.unwrap();

		store.delete_prefix("tiles/s2_harmonized").await.unwrap();

		assert!(!store.exists("tiles/s2_harmonized/WET/2023/tvi-red/10/5/5.png").await.unwrap());
		assert!(store.exists("tiles/landsat/DRY/1990/tvi-ndvi/10/5/5.png").await.unwrap());
	}

	#[tokio::test]
	async fn delete_prefix_of_missing_path_is_ok() {
		let dir = tempdir().unwrap();
		let store = FsBlobStore::new(dir.path());
		store.delete_prefix("tiles/nothing-here").await.unwrap();
	}
}
