//! Fast key/value store for small records: URL templates, metadata pointers, rate-limit
//! counters, and coalescer election markers (spec §4.2).
//!
//! The interface is intentionally substrate-agnostic (spec §9's Open Question: the
//! source implies either `fastapi-limiter`-style Redis or a custom adaptive limiter
//! back it). [`InProcessMetaStore`] is the reference implementation this workspace
//! ships; a Redis-backed implementation would satisfy the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Outcome of a single `incr_bucket` round trip (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketDecision {
	pub allowed: bool,
	pub remaining: f64,
	pub reset_at: OffsetDateTime,
}

/// Semantic interface over the metadata store. All operations must be non-blocking
/// under normal load; callers (the `Limiter` and `MosaicCache`) degrade open on failure
/// per spec §7, they never treat a `MetaStore` error as "no coalescing".
#[async_trait]
pub trait MetaStore: Send + Sync {
	/// Reads the current value for `key`, if present and unexpired.
	async fn get(&self, key: &str) -> Option<Vec<u8>>;

	/// Unconditionally writes `value` under `key` with the given `ttl`.
	async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);

	/// Atomic put-if-absent: writes `value` under `key` with `ttl` only if `key` is
	/// currently absent or expired. Returns whether this call won the write.
	///
	/// This is the single primitive the `MosaicCache`'s cross-process election
	/// (spec §4.6) is built on.
	async fn setnx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool;

	/// Deletes `key`, if present. A no-op if absent.
	async fn del(&self, key: &str);

	/// Deletes every key with the given prefix (used by admin cache invalidation).
	async fn del_prefix(&self, prefix: &str);

	/// Atomic token-bucket refill-and-withdraw in one round trip (spec §4.2, §4.8).
	///
	/// Refills the bucket for elapsed time since `last_refill` at `rate` tokens/second,
	/// caps at `capacity`, then attempts to withdraw `cost` tokens.
	async fn incr_bucket(&self, key: &str, cost: f64, capacity: f64, rate: f64, now: OffsetDateTime) -> BucketDecision;
}

struct Entry {
	value: Vec<u8>,
	expires_at: OffsetDateTime,
}

impl Entry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at > now
	}
}

struct BucketEntry {
	tokens: f64,
	last_refill: OffsetDateTime,
	capacity: f64,
}

/// In-process reference `MetaStore`: a sharded concurrent map guarded per-entry, the
/// same `dashmap` + `parking_lot` combination `versatiles::server::tile_server.rs`
/// uses for its lock-free tile/static source registries.
///
/// Degrades cross-process guarantees to per-process ones (spec §7): single-flight
/// election still holds within one instance, just not across the fleet.
#[derive(Default)]
pub struct InProcessMetaStore {
	kv: DashMap<String, Entry>,
	buckets: DashMap<String, BucketEntry>,
}

impl InProcessMetaStore {
	#[must_use]
	pub fn new() -> Self {
		Self {
			kv: DashMap::new(),
			buckets: DashMap::new(),
		}
	}
}

#[async_trait]
impl MetaStore for InProcessMetaStore {
	async fn get(&self, key: &str) -> Option<Vec<u8>> {
		let now = OffsetDateTime::now_utc();
		let entry = self.kv.get(key)?;
		if entry.is_live(now) { Some(entry.value.clone()) } else { None }
	}

	async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
		let expires_at = OffsetDateTime::now_utc() + ttl;
		self.kv.insert(key.to_owned(), Entry { value, expires_at });
	}

	async fn setnx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
		let now = OffsetDateTime::now_utc();
		let expires_at = now + ttl;
		match self.kv.entry(key.to_owned()) {
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				slot.insert(Entry { value, expires_at });
				true
			}
			dashmap::mapref::entry::Entry::Occupied(mut slot) => {
				if slot.get().is_live(now) {
					false
				} else {
					slot.insert(Entry { value, expires_at });
					true
				}
			}
		}
	}

	async fn del(&self, key: &str) {
		self.kv.remove(key);
	}

	async fn del_prefix(&self, prefix: &str) {
		self.kv.retain(|k, _| !k.starts_with(prefix));
	}

	async fn incr_bucket(&self, key: &str, cost: f64, capacity: f64, rate: f64, now: OffsetDateTime) -> BucketDecision {
		let mut entry = self.buckets.entry(key.to_owned()).or_insert_with(|| BucketEntry {
			tokens: capacity,
			last_refill: now,
			capacity,
		});

		let elapsed = (now - entry.last_refill).as_seconds_f64().max(0.0);
		entry.tokens = (entry.tokens + elapsed * rate).min(capacity);
		entry.last_refill = now;
		entry.capacity = capacity;

		let allowed = entry.tokens >= cost;
		if allowed {
			entry.tokens -= cost;
		}

		let deficit = (capacity - entry.tokens).max(0.0);
		let reset_at = if rate > 0.0 {
			now + Duration::from_secs_f64(deficit / rate)
		} else {
			now
		};

		BucketDecision {
			allowed,
			remaining: entry.tokens,
			reset_at,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn set_then_get_round_trips() {
		let store = InProcessMetaStore::new();
		store.set("k", b"v".to_vec(), Duration::from_secs(60)).await;
		assert_eq!(store.get("k").await, Some(b"v".to_vec()));
	}

	#[tokio::test]
	async fn get_of_missing_key_is_none() {
		let store = InProcessMetaStore::new();
		assert_eq!(store.get("nope").await, None);
	}

	#[tokio::test]
	async fn expired_entry_reads_as_absent() {
		let store = InProcessMetaStore::new();
		store.set("k", b"v".to_vec(), Duration::from_millis(1)).await;
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(store.get("k").await, None);
	}

	#[tokio::test]
	async fn setnx_elects_exactly_one_winner() {
		let store = InProcessMetaStore::new();
		let first = store.setnx("k", b"a".to_vec(), Duration::from_secs(60)).await;
		let second = store.setnx("k", b"b".to_vec(), Duration::from_secs(60)).await;
		assert!(first);
		assert!(!second);
		assert_eq!(store.get("k").await, Some(b"a".to_vec()));
	}

	#[tokio::test]
	async fn setnx_after_expiry_re_elects() {
		let store = InProcessMetaStore::new();
		store.setnx("k", b"a".to_vec(), Duration::from_millis(1)).await;
		tokio::time::sleep(Duration::from_millis(20)).await;
		let second = store.setnx("k", b"b".to_vec(), Duration::from_secs(60)).await;
		assert!(second);
		assert_eq!(store.get("k").await, Some(b"b".to_vec()));
	}

	#[tokio::test]
	async fn del_prefix_removes_matching_keys_only() {
		let store = InProcessMetaStore::new();
		store.set("tiles/a", b"1".to_vec(), Duration::from_secs(60)).await;
		store.set("tiles/b", b"2".to_vec(), Duration::from_secs(60)).await;
		store.set("mosaic/a", b"3".to_vec(), Duration::from_secs(60)).await;

		store.del_prefix("tiles/").await;

		assert_eq!(store.get("tiles/a").await, None);
		assert_eq!(store.get("tiles/b").await, None);
		assert_eq!(store.get("mosaic/a").await, Some(b"3".to_vec()));
	}

	#[tokio::test]
	async fn incr_bucket_allows_up_to_capacity_then_throttles() {
		let store = InProcessMetaStore::new();
		let now = OffsetDateTime::now_utc();

		for _ in 0..5 {
			let decision = store.incr_bucket("bucket", 1.0, 5.0, 1.0, now).await;
			assert!(decision.allowed);
		}

		let decision = store.incr_bucket("bucket", 1.0, 5.0, 1.0, now).await;
		assert!(!decision.allowed);
	}

	#[tokio::test]
	async fn incr_bucket_refills_over_time() {
		let store = InProcessMetaStore::new();
		let t0 = OffsetDateTime::now_utc();

		for _ in 0..5 {
			store.incr_bucket("bucket", 1.0, 5.0, 1.0, t0).await;
		}
		assert!(!store.incr_bucket("bucket", 1.0, 5.0, 1.0, t0).await.allowed);

		let t1 = t0 + Duration::from_secs(2);
		let decision = store.incr_bucket("bucket", 1.0, 5.0, 1.0, t1).await;
		assert!(decision.allowed);
	}
}
