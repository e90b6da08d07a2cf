//! `TileEngine`: the hot path of spec §4.9. Turns a validated [`TileRequest`] into cached
//! PNG bytes, admitting at the edge, falling through LocalCache → BlobStore → the
//! coalesced mosaic build → a single-flighted upstream tile fetch.

use std::sync::Arc;
use std::time::Duration;

use tilefarm_cache::{BlobStore, Limiter, LocalCache, MosaicCache, SingleFlight, UpstreamClient, UpstreamError};
use tilefarm_core::{Blob, CoreError, KeySpace, TileKey, TileRequest, VisParamRegistry};

/// Retry-After seconds reported when the circuit breaker is open or upstream asked us
/// to back off; mirrors `LimiterConfig::circuit_reset_after`'s default ceiling (spec §4.8).
const UPSTREAM_THROTTLE_RETRY_SECS: u64 = 30;

/// Where a served tile's bytes came from; mirrored onto the `X-Cache` response header
/// (spec §6's wire format: `X-Cache: LOCAL|HIT|MISS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
	Local,
	Hit,
	Miss,
}

impl CacheStatus {
	#[must_use]
	pub fn as_header_value(self) -> &'static str {
		match self {
			CacheStatus::Local => "LOCAL",
			CacheStatus::Hit => "HIT",
			CacheStatus::Miss => "MISS",
		}
	}
}

/// A served tile, ready to stream back to the client.
#[derive(Debug, Clone)]
pub struct TileResponse {
	pub blob: Blob,
	pub cache_status: CacheStatus,
	pub etag: String,
}

/// Backoff schedule for retrying a `Transient` upstream tile fetch (spec §4.9 step 6).
/// `Permanent` failures are never retried; `Quota` failures are reported as `Throttled`
/// without consuming a retry slot.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub backoffs: Vec<Duration>,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			backoffs: vec![Duration::from_millis(100), Duration::from_millis(300)],
		}
	}
}

/// Composes every cache tier and the coalescer into the single call the HTTP layer
/// drives (spec §4.9). Cheap to clone-share: every field is already an `Arc` or a
/// reference-counted handle, so a `TileEngine` is normally built once and wrapped in
/// an `Arc` itself.
pub struct TileEngine {
	blobs: Arc<dyn BlobStore>,
	local: Arc<LocalCache>,
	mosaics: Arc<MosaicCache>,
	limiter: Arc<Limiter>,
	upstream: Arc<dyn UpstreamClient>,
	registry: Arc<dyn VisParamRegistry>,
	retry: RetryConfig,
	flight: SingleFlight<String, Result<Blob, CoreError>>,
}

impl TileEngine {
	#[must_use]
	pub fn new(
		blobs: Arc<dyn BlobStore>,
		local: Arc<LocalCache>,
		mosaics: Arc<MosaicCache>,
		limiter: Arc<Limiter>,
		upstream: Arc<dyn UpstreamClient>,
		registry: Arc<dyn VisParamRegistry>,
	) -> Self {
		Self {
			blobs,
			local,
			mosaics,
			limiter,
			upstream,
			registry,
			retry: RetryConfig::default(),
			flight: SingleFlight::new(),
		}
	}

	#[must_use]
	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	/// Edge admission alone (spec §4.8): must run before any KeySpace validation, so
	/// callers that need to inspect the request's key ahead of [`Self::get_tile_preadmitted`]
	/// (an `If-None-Match` check, say) call this first rather than validating early.
	///
	/// # Errors
	/// `Throttled` if the edge limiter or circuit breaker denies the request.
	pub async fn admit_edge(&self, client_identity: &str) -> Result<(), CoreError> {
		match self.limiter.admit_edge(client_identity).await {
			tilefarm_cache::EdgeDecision::Allowed => Ok(()),
			tilefarm_cache::EdgeDecision::Throttled { retry_after_secs } => Err(CoreError::Throttled { retry_after_secs }),
		}
	}

	/// Runs the full pipeline of spec §4.9 for `req`, issued by `client_identity`.
	///
	/// # Errors
	/// `Throttled` if the edge limiter or circuit breaker denies the request; `BadRequest`
	/// / `NotFound` from key validation; `UpstreamTransient` / `UpstreamPermanent` if the
	/// mosaic build or tile fetch ultimately fails.
	pub async fn get_tile(&self, req: &TileRequest, client_identity: &str) -> Result<TileResponse, CoreError> {
		self.admit_edge(client_identity).await?;
		self.get_tile_preadmitted(req).await
	}

	/// Steps 2-9 of spec §4.9: validation through to the tile response. Callers that
	/// already ran [`Self::admit_edge`] themselves (to compute a key ahead of time, e.g.
	/// for an `If-None-Match` check) call this directly instead of [`Self::get_tile`], so
	/// admission is never charged twice for one request.
	///
	/// # Errors
	/// `BadRequest` / `NotFound` from key validation; `UpstreamTransient` /
	/// `UpstreamPermanent` if the mosaic build or tile fetch ultimately fails.
	pub async fn get_tile_preadmitted(&self, req: &TileRequest) -> Result<TileResponse, CoreError> {
		let key = KeySpace::canonicalise(req, self.registry.as_ref())?;
		let path = KeySpace::blob_path(&key);
		let etag = key.etag();

		if let Some(blob) = self.local.get(&path).await {
			return Ok(TileResponse { blob, cache_status: CacheStatus::Local, etag });
		}

		if let Some(blob) = self.blobs.get(&path).await? {
			self.local.insert(path.clone(), blob.clone()).await;
			return Ok(TileResponse { blob, cache_status: CacheStatus::Hit, etag });
		}

		let mosaic_key = KeySpace::mosaic_of(&key);
		let url_template = self.mosaics.get_or_build(&mosaic_key).await?;

		let blobs = self.blobs.clone();
		let local = self.local.clone();
		let limiter = self.limiter.clone();
		let upstream = self.upstream.clone();
		let retry = self.retry.clone();
		let fetch_key = key.clone();
		let fetch_path = path.clone();

		let blob = self
			.flight
			.run(key.canonical(), move || async move {
				let blob = fetch_with_retries(&upstream, &limiter, &retry, &fetch_key, &url_template).await?;
				local.insert(fetch_path.clone(), blob.clone()).await;

				let put_blobs = blobs;
				let put_path = fetch_path;
				let put_blob = blob.clone();
				tokio::spawn(async move {
					if let Err(err) = put_blobs.put(&put_path, put_blob).await {
						log::error!("failed to persist tile blob '{put_path}': {err:#}");
					}
				});

				Ok(blob)
			})
			.await?;

		Ok(TileResponse { blob, cache_status: CacheStatus::Miss, etag })
	}
}

/// Fetches `key`'s tile against `url_template`, retrying `Transient` failures per
/// `retry`'s backoff schedule. Reports the outcome to `limiter`'s circuit breaker.
async fn fetch_with_retries(
	upstream: &Arc<dyn UpstreamClient>,
	limiter: &Limiter,
	retry: &RetryConfig,
	key: &TileKey,
	url_template: &str,
) -> Result<Blob, CoreError> {
	let mut attempt = 0usize;

	loop {
		let Some(permit) = limiter.admit_upstream().await else {
			return Err(CoreError::Throttled {
				retry_after_secs: UPSTREAM_THROTTLE_RETRY_SECS,
			});
		};

		match upstream.fetch_tile(key, url_template).await {
			Ok(blob) => {
				permit.succeed();
				return Ok(blob);
			}
			Err(UpstreamError::Transient(reason)) => {
				permit.fail();
				if attempt < retry.backoffs.len() {
					let wait = retry.backoffs[attempt];
					attempt += 1;
					tokio::time::sleep(wait).await;
					continue;
				}
				log::warn!("tile fetch for {key} exhausted retries: {reason}");
				return Err(CoreError::UpstreamTransient);
			}
			Err(UpstreamError::Permanent(reason)) => {
				permit.fail();
				return Err(CoreError::UpstreamPermanent { reason });
			}
			Err(UpstreamError::Quota(reason)) => {
				permit.fail();
				log::warn!("tile fetch for {key} hit upstream quota: {reason}");
				return Err(CoreError::Throttled {
					retry_after_secs: UPSTREAM_THROTTLE_RETRY_SECS,
				});
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tilefarm_cache::{InProcessMetaStore, LimiterConfig, MosaicCacheConfig, UpstreamOutcome};
	use tilefarm_core::{Layer, Period, StaticVisParamRegistry, VisParam, VisParamCategory};

	fn registry() -> Arc<dyn VisParamRegistry> {
		Arc::new(StaticVisParamRegistry::new(vec![VisParam {
			name: "tvi-red".into(),
			category: VisParamCategory::Sentinel,
			bands: vec!["B04".into(), "B08".into(), "B02".into()],
			stretch_min: 0.0,
			stretch_max: 0.3,
			palette: None,
			active: true,
		}]))
	}

	fn request() -> TileRequest {
		TileRequest {
			layer: Layer::S2Harmonized,
			z: 12,
			x: 100,
			y: 100,
			period: Period::Wet,
			year: 2023,
			month: None,
			visparam: "tvi-red".into(),
		}
	}

	struct FakeUpstream {
		build_calls: AtomicUsize,
		fetch_calls: AtomicUsize,
		fetch_failures_then_success: AtomicUsize,
	}

	impl FakeUpstream {
		fn new() -> Self {
			Self {
				build_calls: AtomicUsize::new(0),
				fetch_calls: AtomicUsize::new(0),
				fetch_failures_then_success: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl UpstreamClient for FakeUpstream {
		async fn build_mosaic(&self, _key: &tilefarm_core::MosaicKey) -> Result<UpstreamOutcome, UpstreamError> {
			self.build_calls.fetch_add(1, Ordering::SeqCst);
			Ok(UpstreamOutcome {
				url_template: "https://example.test/{z}/{x}/{y}.png".into(),
			})
		}

		async fn fetch_tile(&self, _key: &TileKey, _url_template: &str) -> Result<Blob, UpstreamError> {
			self.fetch_calls.fetch_add(1, Ordering::SeqCst);
			let remaining = self.fetch_failures_then_success.load(Ordering::SeqCst);
			if remaining > 0 {
				self.fetch_failures_then_success.fetch_sub(1, Ordering::SeqCst);
				return Err(UpstreamError::Transient("connection reset".into()));
			}
			Ok(Blob::from(b"pngbytes".to_vec()))
		}
	}

	fn engine(upstream: Arc<FakeUpstream>) -> (TileEngine, Arc<tilefarm_cache::FsBlobStore>, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let blobs = Arc::new(tilefarm_cache::FsBlobStore::new(dir.path()));
		let meta: Arc<dyn tilefarm_cache::MetaStore> = Arc::new(InProcessMetaStore::new());
		let local = Arc::new(LocalCache::new(1024 * 1024, Duration::from_secs(60)));
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), MosaicCacheConfig::default()));
		let limiter = Arc::new(Limiter::new(meta, LimiterConfig::default()));
		let engine = TileEngine::new(blobs.clone(), local, mosaics, limiter, upstream, registry());
		(engine, blobs, dir)
	}

	#[tokio::test]
	async fn cold_request_builds_mosaic_fetches_tile_and_populates_both_caches() {
		let upstream = Arc::new(FakeUpstream::new());
		let (engine, blobs, _dir) = engine(upstream.clone());

		let resp = engine.get_tile(&request(), "client-a").await.unwrap();

		assert_eq!(resp.cache_status, CacheStatus::Miss);
		assert_eq!(resp.blob.as_slice(), b"pngbytes");
		assert_eq!(upstream.build_calls.load(Ordering::SeqCst), 1);
		assert_eq!(upstream.fetch_calls.load(Ordering::SeqCst), 1);

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(blobs.exists("tiles/s2_harmonized/WET/2023/tvi-red/12/100/100.png").await.unwrap());
	}

	#[tokio::test]
	async fn second_request_hits_local_cache_without_touching_upstream() {
		let upstream = Arc::new(FakeUpstream::new());
		let (engine, _blobs, _dir) = engine(upstream.clone());

		engine.get_tile(&request(), "client-a").await.unwrap();
		tokio::time::sleep(Duration::from_millis(20)).await;
		let second = engine.get_tile(&request(), "client-a").await.unwrap();

		assert_eq!(second.cache_status, CacheStatus::Local);
		assert_eq!(upstream.fetch_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn blob_store_hit_repopulates_local_cache() {
		let upstream = Arc::new(FakeUpstream::new());
		let dir = tempfile::tempdir().unwrap();
		let blobs = Arc::new(tilefarm_cache::FsBlobStore::new(dir.path()));
		blobs
			.put(
				"tiles/s2_harmonized/WET/2023/tvi-red/12/100/100.png",
				Blob::from(b"preexisting".to_vec()),
			)
			.await
			.unwrap();

		let meta: Arc<dyn tilefarm_cache::MetaStore> = Arc::new(InProcessMetaStore::new());
		let local = Arc::new(LocalCache::new(1024 * 1024, Duration::from_secs(60)));
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), MosaicCacheConfig::default()));
		let limiter = Arc::new(Limiter::new(meta, LimiterConfig::default()));
		let engine = TileEngine::new(blobs, local.clone(), mosaics, limiter, upstream.clone(), registry());

		let resp = engine.get_tile(&request(), "client-a").await.unwrap();

		assert_eq!(resp.cache_status, CacheStatus::Hit);
		assert_eq!(resp.blob.as_slice(), b"preexisting");
		assert_eq!(upstream.build_calls.load(Ordering::SeqCst), 0);
		assert!(local.get("tiles/s2_harmonized/WET/2023/tvi-red/12/100/100.png").await.is_some());
	}

	#[tokio::test]
	async fn transient_fetch_failure_is_retried_and_eventually_succeeds() {
		let upstream = Arc::new(FakeUpstream::new());
		upstream.fetch_failures_then_success.store(1, Ordering::SeqCst);
		let (engine, _blobs, _dir) = engine(upstream.clone());

		let resp = engine.get_tile(&request(), "client-a").await.unwrap();

		assert_eq!(resp.cache_status, CacheStatus::Miss);
		assert_eq!(upstream.fetch_calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn permanent_fetch_failure_is_not_retried() {
		struct AlwaysPermanent;

		#[async_trait]
		impl UpstreamClient for AlwaysPermanent {
			async fn build_mosaic(&self, _key: &tilefarm_core::MosaicKey) -> Result<UpstreamOutcome, UpstreamError> {
				Ok(UpstreamOutcome {
					url_template: "https://example.test/{z}/{x}/{y}.png".into(),
				})
			}

			async fn fetch_tile(&self, _key: &TileKey, _url_template: &str) -> Result<Blob, UpstreamError> {
				Err(UpstreamError::Permanent("no such tile".into()))
			}
		}

		let upstream = Arc::new(AlwaysPermanent);
		let dir = tempfile::tempdir().unwrap();
		let blobs = Arc::new(tilefarm_cache::FsBlobStore::new(dir.path()));
		let meta: Arc<dyn tilefarm_cache::MetaStore> = Arc::new(InProcessMetaStore::new());
		let local = Arc::new(LocalCache::new(1024 * 1024, Duration::from_secs(60)));
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), MosaicCacheConfig::default()));
		let limiter = Arc::new(Limiter::new(meta, LimiterConfig::default()));
		let engine = TileEngine::new(blobs, local, mosaics, limiter, upstream, registry());

		let err = engine.get_tile(&request(), "client-a").await.unwrap_err();
		assert!(matches!(err, CoreError::UpstreamPermanent { .. }));
	}

	#[tokio::test]
	async fn edge_limiter_denial_short_circuits_before_any_cache_work() {
		let upstream = Arc::new(FakeUpstream::new());
		let dir = tempfile::tempdir().unwrap();
		let blobs = Arc::new(tilefarm_cache::FsBlobStore::new(dir.path()));
		let meta: Arc<dyn tilefarm_cache::MetaStore> = Arc::new(InProcessMetaStore::new());
		let local = Arc::new(LocalCache::new(1024 * 1024, Duration::from_secs(60)));
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), MosaicCacheConfig::default()));
		let limiter = Arc::new(Limiter::new(
			meta,
			LimiterConfig {
				edge_capacity: 1.0,
				edge_rate_per_sec: 0.0,
				..Default::default()
			},
		));
		let engine = TileEngine::new(blobs, local, mosaics, limiter, upstream.clone(), registry());

		engine.get_tile(&request(), "client-a").await.unwrap();
		let err = engine.get_tile(&request(), "client-a").await.unwrap_err();

		assert!(matches!(err, CoreError::Throttled { .. }));
		assert_eq!(upstream.build_calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn concurrent_requests_for_the_same_tile_coalesce_into_one_fetch() {
		let upstream = Arc::new(FakeUpstream::new());
		let (engine, _blobs, _dir) = engine(upstream.clone());
		let engine = Arc::new(engine);

		let mut handles = Vec::new();
		for _ in 0..5 {
			let engine = engine.clone();
			handles.push(tokio::spawn(async move { engine.get_tile(&request(), "client-a").await }));
		}

		for handle in handles {
			assert!(handle.await.unwrap().is_ok());
		}
		assert_eq!(upstream.fetch_calls.load(Ordering::SeqCst), 1);
	}
}
