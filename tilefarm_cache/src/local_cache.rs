//! Optional in-process LRU in front of the [`crate::BlobStore`] (spec §4.3's L1 tier).
//!
//! A miss here is never a failure: every caller falls through to the durable blob
//! store, so this cache only ever shortens the hot path, it is never a source of truth.

use std::time::Duration;
use tilefarm_core::Blob;

/// Thin wrapper over a `moka` async cache keyed by canonical tile path.
///
/// Weighed by encoded byte size rather than entry count, matching how the teacher
/// sizes its in-memory tile caches: a `max_weight` of raw bytes rather than a tile count
/// keeps capacity meaningful across visparams with very different PNG sizes.
pub struct LocalCache {
	cache: moka::future::Cache<String, Blob>,
}

impl LocalCache {
	#[must_use]
	pub fn new(max_weight_bytes: u64, ttl: Duration) -> Self {
		let cache = moka::future::Cache::builder()
			.max_capacity(max_weight_bytes)
			.weigher(|_key: &String, value: &Blob| -> u32 { value.len().try_into().unwrap_or(u32::MAX) })
			.time_to_live(ttl)
			.build();
		Self { cache }
	}

	pub async fn get(&self, path: &str) -> Option<Blob> {
		self.cache.get(path).await
	}

	pub async fn insert(&self, path: String, blob: Blob) {
		self.cache.insert(path, blob).await;
	}

	pub async fn invalidate(&self, path: &str) {
		self.cache.invalidate(path).await;
	}

	/// Drops every entry whose path starts with `prefix` (spec §4.11 admin invalidation).
	pub fn invalidate_prefix(&self, prefix: &str) {
		let prefix = prefix.to_owned();
		self.cache.invalidate_entries_if(move |key, _| key.starts_with(&prefix)).ok();
	}

	/// Approximate number of entries currently cached; `moka` counts lazily.
	pub async fn entry_count(&self) -> u64 {
		self.cache.run_pending_tasks().await;
		self.cache.entry_count()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cache() -> LocalCache {
		LocalCache::new(1024 * 1024, Duration::from_secs(60))
	}

	#[tokio::test]
	async fn insert_then_get_round_trips() {
		let cache = cache();
		cache.insert("tiles/a.png".into(), Blob::from(b"bytes".to_vec())).await;
		let got = cache.get("tiles/a.png").await.unwrap();
		assert_eq!(got.as_slice(), b"bytes");
	}

	#[tokio::test]
	async fn get_of_missing_path_is_none() {
		let cache = cache();
		assert!(cache.get("tiles/missing.png").await.is_none());
	}

	#[tokio::test]
	async fn invalidate_removes_entry() {
		let cache = cache();
		cache.insert("tiles/a.png".into(), Blob::from(b"bytes".to_vec())).await;
		cache.invalidate("tiles/a.png").await;
		assert!(cache.get("tiles/a.png").await.is_none());
	}

	#[tokio::test]
	async fn invalidate_prefix_clears_matching_entries_only() {
		let cache = cache();
		cache.insert("tiles/s2/a.png".into(), Blob::from(b"1".to_vec())).await;
		cache.insert("tiles/s2/b.png".into(), Blob::from(b"2".to_vec())).await;
		cache.insert("tiles/landsat/a.png".into(), Blob::from(b"3".to_vec())).await;

		cache.invalidate_prefix("tiles/s2");
		cache.cache.run_pending_tasks().await;

		assert!(cache.get("tiles/s2/a.png").await.is_none());
		assert!(cache.get("tiles/s2/b.png").await.is_none());
		assert!(cache.get("tiles/landsat/a.png").await.is_some());
	}
}
