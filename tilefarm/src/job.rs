//! `JobEngine`: the background cache-warming worker pool of spec §4.10.
//!
//! Jobs enter through one of four priority queues (`High`, `Standard`, `Low`,
//! `Maintenance`) and are drained by a fixed pool of workers, each running one job to
//! completion before picking up the next so a single fat job occupies only one worker
//! slot. Warming simply replays [`TileEngine::get_tile`] for every tile the job names;
//! tiles already in the BlobStore resolve as cache hits and never touch the upstream
//! budget, which is what makes re-running a job idempotent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use uuid::Uuid;

use tilefarm_core::{Layer, Period, TileRequest, progress::get_progress_bar};

use crate::engine::TileEngine;

/// Identity stamped on every request the job engine issues, so edge rate limiting and
/// logs can tell warming traffic apart from live user traffic.
const WARM_CLIENT_IDENTITY: &str = "job-engine";

/// Backoff schedule for a transient tile failure inside a warming job (spec §4.10's
/// "retried with exponential backoff up to 3 attempts").
const RETRY_BACKOFFS: [Duration; 3] = [Duration::from_millis(200), Duration::from_millis(500), Duration::from_secs(1)];

/// Fixed zoom set covered by a single point warm (spec §4.10). Unlike `WarmRegion`'s
/// `zooms`, this is not an operator-supplied parameter.
const WARM_POINT_ZOOMS: [u8; 3] = [12, 13, 14];

/// A job's relative scheduling priority. Workers always prefer a non-empty higher
/// queue over a lower one, so `Maintenance` work only runs when nothing more urgent
/// is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
	Maintenance,
	Low,
	Standard,
	High,
}

impl Priority {
	fn all_high_to_low() -> [Priority; 4] {
		[Priority::High, Priority::Standard, Priority::Low, Priority::Maintenance]
	}
}

/// One point to warm: every `(layer, year, visparam)` combination requested, at each of
/// [`WARM_POINT_ZOOMS`], is enumerated into a tile request around this point.
#[derive(Debug, Clone)]
pub struct WarmPoint {
	pub lon: f64,
	pub lat: f64,
	pub layers: Vec<Layer>,
	pub years: Vec<u16>,
	pub visparams: Vec<String>,
	pub period: Period,
	pub month: Option<u8>,
}

/// A geographic bounding box to warm, at every requested zoom.
#[derive(Debug, Clone)]
pub struct WarmRegion {
	pub bbox: tilefarm_core::GeoBBox,
	pub layers: Vec<Layer>,
	pub years: Vec<u16>,
	pub zooms: Vec<u8>,
	pub visparams: Vec<String>,
	pub period: Period,
	pub month: Option<u8>,
}

/// A campaign run: pulls its point list from a [`CampaignStore`] and warms each point
/// (at [`WARM_POINT_ZOOMS`]) in batches, updating [`CampaignProgress`] as it goes.
#[derive(Debug, Clone)]
pub struct WarmCampaign {
	pub campaign_id: String,
	pub batch_size: usize,
	pub layers: Vec<Layer>,
	pub years: Vec<u16>,
	pub visparams: Vec<String>,
	pub period: Period,
	pub month: Option<u8>,
}

/// A single cache-warming unit of work (spec §4.10).
#[derive(Debug, Clone)]
pub enum JobKind {
	WarmPoint(WarmPoint),
	WarmRegion(WarmRegion),
	WarmCampaign(WarmCampaign),
}

impl JobKind {
	fn label(&self) -> &'static str {
		match self {
			JobKind::WarmPoint(_) => "warm-point",
			JobKind::WarmRegion(_) => "warm-region",
			JobKind::WarmCampaign(_) => "warm-campaign",
		}
	}
}

/// Lifecycle state of a [`JobRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
	Pending,
	Running,
	Success,
	Failed,
	Cancelled,
}

/// Running totals for a job's tile attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobCounters {
	pub total: u64,
	pub done: u64,
	pub failed: u64,
}

/// The status of a submitted job, as returned by `GET /tasks/{id}` (spec §4.11).
#[derive(Debug, Clone)]
pub struct JobRecord {
	pub id: Uuid,
	pub kind_label: &'static str,
	pub priority: Priority,
	pub state: JobState,
	pub counters: JobCounters,
	pub last_error: Option<String>,
}

impl JobRecord {
	fn pending(id: Uuid, kind: &JobKind, priority: Priority) -> Self {
		Self {
			id,
			kind_label: kind.label(),
			priority,
			state: JobState::Pending,
			counters: JobCounters::default(),
			last_error: None,
		}
	}
}

/// One point inside a cache-warming campaign.
#[derive(Debug, Clone)]
pub struct CampaignPoint {
	pub id: String,
	pub lon: f64,
	pub lat: f64,
	pub cached: bool,
}

/// Aggregate progress for a campaign, mirrored to callers polling
/// `GET /cache/campaign/{id}/status` (spec §3, §4.11).
#[derive(Debug, Clone, Default)]
pub struct CampaignProgress {
	pub total_points: u64,
	pub cached_points: u64,
	pub caching_in_progress: bool,
	pub caching_completed: bool,
	pub caching_error: Option<String>,
}

impl CampaignProgress {
	#[must_use]
	pub fn cache_percentage(&self) -> f64 {
		if self.total_points == 0 {
			0.0
		} else {
			100.0 * self.cached_points as f64 / self.total_points as f64
		}
	}
}

/// External collaborator that owns campaign point lists and their cached/not-cached
/// state. `JobEngine` only reads and writes through this trait, so a real deployment
/// can back it with whatever store tracks campaigns (spec §4.10's "external campaign
/// store").
#[async_trait]
pub trait CampaignStore: Send + Sync {
	async fn points(&self, campaign_id: &str) -> anyhow::Result<Vec<CampaignPoint>>;
	async fn mark_cached(&self, campaign_id: &str, point_id: &str) -> anyhow::Result<()>;
	async fn progress(&self, campaign_id: &str) -> anyhow::Result<CampaignProgress>;
	async fn set_in_progress(&self, campaign_id: &str, in_progress: bool) -> anyhow::Result<()>;
}

/// In-memory reference [`CampaignStore`], suitable for tests and single-node
/// deployments without an external campaign backend.
#[derive(Default)]
pub struct InMemoryCampaignStore {
	points: DashMap<String, Vec<CampaignPoint>>,
	in_progress: DashMap<String, bool>,
}

impl InMemoryCampaignStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn seed(&self, campaign_id: impl Into<String>, points: Vec<CampaignPoint>) {
		self.points.insert(campaign_id.into(), points);
	}
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
	async fn points(&self, campaign_id: &str) -> anyhow::Result<Vec<CampaignPoint>> {
		Ok(self.points.get(campaign_id).map(|v| v.clone()).unwrap_or_default())
	}

	async fn mark_cached(&self, campaign_id: &str, point_id: &str) -> anyhow::Result<()> {
		if let Some(mut points) = self.points.get_mut(campaign_id) {
			if let Some(point) = points.iter_mut().find(|p| p.id == point_id) {
				point.cached = true;
			}
		}
		Ok(())
	}

	async fn progress(&self, campaign_id: &str) -> anyhow::Result<CampaignProgress> {
		let points = self.points(campaign_id).await?;
		let total_points = points.len() as u64;
		let cached_points = points.iter().filter(|p| p.cached).count() as u64;
		Ok(CampaignProgress {
			total_points,
			cached_points,
			caching_in_progress: self.in_progress.get(campaign_id).map(|v| *v).unwrap_or(false),
			caching_completed: total_points > 0 && cached_points == total_points,
			caching_error: None,
		})
	}

	async fn set_in_progress(&self, campaign_id: &str, in_progress: bool) -> anyhow::Result<()> {
		self.in_progress.insert(campaign_id.to_string(), in_progress);
		Ok(())
	}
}

/// Error returned when a queue has reached [`crate::config::JobConfig::queue_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

impl std::fmt::Display for QueueFull {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "job queue is full")
	}
}

impl std::error::Error for QueueFull {}

type Envelope = (Uuid, JobKind);

/// A campaign-progress fact the `JobEngine` emits while running a warm-campaign job.
/// The engine itself never calls into the [`CampaignStore`] to record progress; it only
/// ever sends one of these. A separate task — the "external campaign progress
/// updater" — drains them and applies the corresponding `CampaignStore` write.
enum CampaignProgressEvent {
	Started {
		campaign_id: String,
	},
	PointCached {
		campaign_id: String,
		point_id: String,
	},
	/// Acked once every prior event for this campaign has been applied, so a caller
	/// awaiting `ack` can rely on `CampaignStore::progress` reflecting the full run.
	Finished {
		campaign_id: String,
		ack: oneshot::Sender<()>,
	},
}

/// Drains `rx` and applies each [`CampaignProgressEvent`] to `campaigns`. Runs for the
/// lifetime of the `JobEngine` that spawned it.
async fn run_campaign_progress_updater(campaigns: Arc<dyn CampaignStore>, mut rx: mpsc::UnboundedReceiver<CampaignProgressEvent>) {
	while let Some(event) = rx.recv().await {
		match event {
			CampaignProgressEvent::Started { campaign_id } => {
				if let Err(err) = campaigns.set_in_progress(&campaign_id, true).await {
					log::error!("failed to mark campaign '{campaign_id}' in progress: {err:#}");
				}
			}
			CampaignProgressEvent::PointCached { campaign_id, point_id } => {
				if let Err(err) = campaigns.mark_cached(&campaign_id, &point_id).await {
					log::error!("failed to mark point '{point_id}' cached for campaign '{campaign_id}': {err:#}");
				}
			}
			CampaignProgressEvent::Finished { campaign_id, ack } => {
				if let Err(err) = campaigns.set_in_progress(&campaign_id, false).await {
					log::error!("failed to clear in-progress for campaign '{campaign_id}': {err:#}");
				}
				let _ = ack.send(());
			}
		}
	}
}

/// The background cache-warming worker pool (spec §4.10). Cheap to clone-share: build
/// one, wrap it in an `Arc`, and call [`JobEngine::enqueue`] from HTTP handlers.
pub struct JobEngine {
	engine: Arc<TileEngine>,
	/// Read-only from the engine's own perspective: `run_warm_campaign` reads a
	/// campaign's point list through this, but every *write* goes through
	/// `progress_tx` instead, so the engine never calls into the external store to
	/// record progress (Design Note §9).
	campaigns: Arc<dyn CampaignStore>,
	queues: Arc<DashMap<Priority, Mutex<VecDeque<Envelope>>>>,
	records: Arc<DashMap<Uuid, JobRecord>>,
	notify: Arc<Notify>,
	queue_capacity: usize,
	depth: Arc<DashMap<Priority, AtomicU64>>,
	progress_tx: mpsc::UnboundedSender<CampaignProgressEvent>,
}

impl JobEngine {
	#[must_use]
	pub fn new(engine: Arc<TileEngine>, campaigns: Arc<dyn CampaignStore>, worker_count: usize, queue_capacity: usize) -> Arc<Self> {
		let queues = Arc::new(DashMap::new());
		let depth = Arc::new(DashMap::new());
		for priority in Priority::all_high_to_low() {
			queues.insert(priority, Mutex::new(VecDeque::new()));
			depth.insert(priority, AtomicU64::new(0));
		}

		let (progress_tx, progress_rx) = mpsc::unbounded_channel();
		tokio::spawn(run_campaign_progress_updater(campaigns.clone(), progress_rx));

		let this = Arc::new(Self {
			engine,
			campaigns,
			queues,
			records: Arc::new(DashMap::new()),
			notify: Arc::new(Notify::new()),
			queue_capacity,
			depth,
			progress_tx,
		});

		for worker_id in 0..worker_count.max(1) {
			let worker = this.clone();
			tokio::spawn(async move { worker.run_worker(worker_id).await });
		}

		this
	}

	/// Submits `kind` at `priority`, returning its job id.
	///
	/// # Errors
	/// `QueueFull` once that priority's backlog has reached `queue_capacity`.
	pub async fn enqueue(&self, kind: JobKind, priority: Priority) -> Result<Uuid, QueueFull> {
		let depth = self.depth.get(&priority).unwrap();
		if depth.load(Ordering::Relaxed) as usize >= self.queue_capacity {
			return Err(QueueFull);
		}

		let id = Uuid::new_v4();
		self.records.insert(id, JobRecord::pending(id, &kind, priority));

		let queue = self.queues.get(&priority).unwrap();
		queue.lock().await.push_back((id, kind));
		depth.fetch_add(1, Ordering::Relaxed);
		self.notify.notify_one();
		Ok(id)
	}

	#[must_use]
	pub fn status(&self, id: Uuid) -> Option<JobRecord> {
		self.records.get(&id).map(|r| r.clone())
	}

	/// Cancels every job still waiting in `priority`'s queue. Jobs already running are
	/// left to finish; they're not interrupted mid-flight.
	pub async fn purge_queue(&self, priority: Priority) -> usize {
		let queue = self.queues.get(&priority).unwrap();
		let mut queue = queue.lock().await;
		let purged = queue.len();
		for (id, _) in queue.drain(..) {
			if let Some(mut record) = self.records.get_mut(&id) {
				record.state = JobState::Cancelled;
			}
		}
		self.depth.get(&priority).unwrap().store(0, Ordering::Relaxed);
		purged
	}

	async fn run_worker(self: Arc<Self>, worker_id: usize) {
		loop {
			let Some((priority, id, kind)) = self.dequeue_next().await else {
				self.notify.notified().await;
				continue;
			};
			log::debug!("worker {worker_id} picked up job {id} ({})", kind.label());
			self.run_job(id, kind).await;
			self.depth.get(&priority).unwrap().fetch_sub(1, Ordering::Relaxed);
		}
	}

	async fn dequeue_next(&self) -> Option<(Priority, Uuid, JobKind)> {
		for priority in Priority::all_high_to_low() {
			let queue = self.queues.get(&priority).unwrap();
			let mut queue = queue.lock().await;
			if let Some((id, kind)) = queue.pop_front() {
				return Some((priority, id, kind));
			}
		}
		None
	}

	async fn run_job(&self, id: Uuid, kind: JobKind) {
		if let Some(mut record) = self.records.get_mut(&id) {
			if record.state == JobState::Cancelled {
				return;
			}
			record.state = JobState::Running;
		}

		let result = match &kind {
			JobKind::WarmPoint(point) => self.run_warm_point(id, point).await,
			JobKind::WarmRegion(region) => self.run_warm_region(id, region).await,
			JobKind::WarmCampaign(campaign) => self.run_warm_campaign(id, campaign).await,
		};

		if let Some(mut record) = self.records.get_mut(&id) {
			let counters = record.counters;
			let failure_ratio = if counters.total == 0 {
				0.0
			} else {
				counters.failed as f64 / counters.total as f64
			};
			record.state = match result {
				Err(err) => {
					record.last_error = Some(err.to_string());
					JobState::Failed
				}
				Ok(()) if failure_ratio > 0.5 => {
					record.last_error = Some(format!("{}/{} tiles failed", counters.failed, counters.total));
					JobState::Failed
				}
				Ok(()) => JobState::Success,
			};
		}
	}

	async fn run_warm_point(&self, id: Uuid, point: &WarmPoint) -> anyhow::Result<()> {
		let mut requests = Vec::new();
		for &zoom in &WARM_POINT_ZOOMS {
			let coord = tilefarm_core::TileCoord::from_geo(point.lon, point.lat, zoom)?;
			for layer in &point.layers {
				for &year in &point.years {
					for visparam in &point.visparams {
						requests.push(TileRequest {
							layer: *layer,
							z: coord.level,
							x: coord.x,
							y: coord.y,
							period: point.period,
							year,
							month: point.month,
							visparam: visparam.clone(),
						});
					}
				}
			}
		}
		self.warm_requests(id, requests).await
	}

	async fn run_warm_region(&self, id: Uuid, region: &WarmRegion) -> anyhow::Result<()> {
		let mut requests = Vec::new();
		for &zoom in &region.zooms {
			let bbox = tilefarm_core::TileBBox::from_geo(zoom, &region.bbox)?;
			for coord in bbox.iter_coords() {
				for layer in &region.layers {
					for &year in &region.years {
						for visparam in &region.visparams {
							requests.push(TileRequest {
								layer: *layer,
								z: coord.level,
								x: coord.x,
								y: coord.y,
								period: region.period,
								year,
								month: region.month,
								visparam: visparam.clone(),
							});
						}
					}
				}
			}
		}
		self.warm_requests(id, requests).await
	}

	async fn run_warm_campaign(&self, id: Uuid, campaign: &WarmCampaign) -> anyhow::Result<()> {
		let _ = self.progress_tx.send(CampaignProgressEvent::Started {
			campaign_id: campaign.campaign_id.clone(),
		});

		let points = self.campaigns.points(&campaign.campaign_id).await?;
		let pending: Vec<_> = points.into_iter().filter(|p| !p.cached).collect();

		let mut progress = get_progress_bar(&format!("campaign {}", campaign.campaign_id), pending.len() as u64);

		let result = async {
			for batch in pending.chunks(campaign.batch_size.max(1)) {
				for point in batch {
					let warm = WarmPoint {
						lon: point.lon,
						lat: point.lat,
						layers: campaign.layers.clone(),
						years: campaign.years.clone(),
						visparams: campaign.visparams.clone(),
						period: campaign.period,
						month: campaign.month,
					};
					self.run_warm_point(id, &warm).await?;
					let _ = self.progress_tx.send(CampaignProgressEvent::PointCached {
						campaign_id: campaign.campaign_id.clone(),
						point_id: point.id.clone(),
					});
					progress.inc(1);
				}
			}
			Ok::<(), anyhow::Error>(())
		}
		.await;

		progress.finish();

		let (ack_tx, ack_rx) = oneshot::channel();
		let _ = self.progress_tx.send(CampaignProgressEvent::Finished {
			campaign_id: campaign.campaign_id.clone(),
			ack: ack_tx,
		});
		// Waiting for the ack guarantees every `PointCached` sent above has already been
		// applied, since the updater drains this channel in order: a caller that awaits
		// `run_warm_campaign` and then reads `CampaignStore::progress` sees the full run.
		let _ = ack_rx.await;

		result
	}

	/// Fetches every tile in `requests` through the shared [`TileEngine`], retrying
	/// transient failures and tallying outcomes into the job's counters. A request
	/// already satisfied by the BlobStore resolves as a cache hit without consuming
	/// any upstream budget, which is what makes re-running a job idempotent.
	async fn warm_requests(&self, id: Uuid, requests: Vec<TileRequest>) -> anyhow::Result<()> {
		if let Some(mut record) = self.records.get_mut(&id) {
			record.counters.total = requests.len() as u64;
		}

		let mut progress = get_progress_bar(&format!("job {id}"), requests.len() as u64);

		for req in &requests {
			let mut attempt = 0usize;
			loop {
				match self.engine.get_tile(req, WARM_CLIENT_IDENTITY).await {
					Ok(_) => {
						if let Some(mut record) = self.records.get_mut(&id) {
							record.counters.done += 1;
						}
						break;
					}
					Err(tilefarm_core::CoreError::UpstreamTransient) if attempt < RETRY_BACKOFFS.len() => {
						tokio::time::sleep(RETRY_BACKOFFS[attempt]).await;
						attempt += 1;
					}
					Err(err) => {
						log::warn!("warming job {id} failed to cache tile {req:?}: {err}");
						if let Some(mut record) = self.records.get_mut(&id) {
							record.counters.failed += 1;
							record.last_error = Some(err.to_string());
						}
						break;
					}
				}
			}
			progress.inc(1);
		}

		progress.finish();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::time::Duration;
	use tilefarm_cache::{FsBlobStore, InProcessMetaStore, Limiter, LimiterConfig, LocalCache, MetaStore, MosaicCache, MosaicCacheConfig, UpstreamClient, UpstreamError, UpstreamOutcome};
	use tilefarm_core::{StaticVisParamRegistry, VisParam, VisParamCategory, VisParamRegistry};

	struct FakeUpstream {
		fetches: AtomicUsize,
	}

	#[async_trait]
	impl UpstreamClient for FakeUpstream {
		async fn build_mosaic(&self, _key: &tilefarm_core::MosaicKey) -> Result<UpstreamOutcome, UpstreamError> {
			Ok(UpstreamOutcome {
				url_template: "https://example.test/{z}/{x}/{y}.png".into(),
			})
		}

		async fn fetch_tile(&self, _key: &tilefarm_core::TileKey, _url_template: &str) -> Result<tilefarm_core::Blob, UpstreamError> {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			Ok(tilefarm_core::Blob::from(b"pngbytes".to_vec()))
		}
	}

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

	fn test_engine() -> (Arc<TileEngine>, Arc<FakeUpstream>, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let blobs = Arc::new(FsBlobStore::new(dir.path()));
		let meta: Arc<dyn MetaStore> = Arc::new(InProcessMetaStore::new());
		let local = Arc::new(LocalCache::new(1024 * 1024, Duration::from_secs(60)));
		let upstream = Arc::new(FakeUpstream { fetches: AtomicUsize::new(0) });
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), MosaicCacheConfig::default()));
		let limiter = Arc::new(Limiter::new(meta, LimiterConfig::default()));
		let engine = Arc::new(TileEngine::new(blobs, local, mosaics, limiter, upstream.clone(), registry()));
		(engine, upstream, dir)
	}

	#[tokio::test]
	async fn warm_point_enumerates_every_zoom_layer_year_visparam_combination() {
		let (engine, upstream, _dir) = test_engine();
		let job_engine = JobEngine::new(engine, Arc::new(InMemoryCampaignStore::new()), 2, 10);

		let id = job_engine
			.enqueue(
				JobKind::WarmPoint(WarmPoint {
					lon: -60.0,
					lat: -10.0,
					layers: vec![Layer::S2Harmonized],
					years: vec![2023],
					visparams: vec!["tvi-red".into()],
					period: Period::Wet,
					month: None,
				}),
				Priority::High,
			)
			.await
			.unwrap();

		let expected = WARM_POINT_ZOOMS.len() as u64;
		for _ in 0..200 {
			if let Some(record) = job_engine.status(id) {
				if record.state == JobState::Success || record.state == JobState::Failed {
					assert_eq!(record.counters.total, expected);
					assert_eq!(record.counters.done, expected);
					assert_eq!(upstream.fetches.load(Ordering::SeqCst) as u64, expected);
					return;
				}
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("job never settled");
	}

	#[tokio::test]
	async fn rerunning_a_warm_point_job_consumes_no_extra_upstream_budget() {
		let (engine, upstream, _dir) = test_engine();
		let job_engine = JobEngine::new(engine, Arc::new(InMemoryCampaignStore::new()), 2, 10);

		let make_job = || WarmPoint {
			lon: -60.0,
			lat: -10.0,
			layers: vec![Layer::S2Harmonized],
			years: vec![2023],
			visparams: vec!["tvi-red".into()],
			period: Period::Wet,
			month: None,
		};
		let expected = WARM_POINT_ZOOMS.len() as u64;

		let first = job_engine.enqueue(JobKind::WarmPoint(make_job()), Priority::High).await.unwrap();
		wait_for_settled(&job_engine, first).await;
		assert_eq!(upstream.fetches.load(Ordering::SeqCst) as u64, expected);

		let second = job_engine.enqueue(JobKind::WarmPoint(make_job()), Priority::High).await.unwrap();
		wait_for_settled(&job_engine, second).await;
		assert_eq!(
			upstream.fetches.load(Ordering::SeqCst) as u64,
			expected,
			"re-run should hit the blob store, not upstream"
		);
	}

	#[tokio::test]
	async fn queue_full_is_reported_once_capacity_is_reached() {
		let (engine, _upstream, _dir) = test_engine();
		let job_engine = JobEngine::new(engine, Arc::new(InMemoryCampaignStore::new()), 0, 1);

		let make_job = || WarmPoint {
			lon: -60.0,
			lat: -10.0,
			layers: vec![Layer::S2Harmonized],
			years: vec![2023],
			visparams: vec!["tvi-red".into()],
			period: Period::Wet,
			month: None,
		};

		job_engine.enqueue(JobKind::WarmPoint(make_job()), Priority::High).await.unwrap();
		let err = job_engine.enqueue(JobKind::WarmPoint(make_job()), Priority::High).await;
		assert_eq!(err, Err(QueueFull));
	}

	#[tokio::test]
	async fn warm_campaign_skips_already_cached_points_and_tracks_progress() {
		let (engine, upstream, _dir) = test_engine();
		let campaigns = Arc::new(InMemoryCampaignStore::new());
		campaigns.seed(
			"demo",
			vec![
				CampaignPoint {
					id: "a".into(),
					lon: -60.0,
					lat: -10.0,
					cached: false,
				},
				CampaignPoint {
					id: "b".into(),
					lon: -61.0,
					lat: -11.0,
					cached: true,
				},
			],
		);
		let job_engine = JobEngine::new(engine, campaigns.clone(), 1, 10);

		let id = job_engine
			.enqueue(
				JobKind::WarmCampaign(WarmCampaign {
					campaign_id: "demo".into(),
					batch_size: 5,
					layers: vec![Layer::S2Harmonized],
					years: vec![2023],
					visparams: vec!["tvi-red".into()],
					period: Period::Wet,
					month: None,
				}),
				Priority::Standard,
			)
			.await
			.unwrap();

		wait_for_settled(&job_engine, id).await;

		assert_eq!(
			upstream.fetches.load(Ordering::SeqCst) as u64,
			WARM_POINT_ZOOMS.len() as u64,
			"only the uncached point should be fetched, at every warm-point zoom"
		);
		let progress = campaigns.progress("demo").await.unwrap();
		assert_eq!(progress.cached_points, 2);
		assert!(progress.caching_completed);
		assert!(!progress.caching_in_progress);
	}

	async fn wait_for_settled(job_engine: &Arc<JobEngine>, id: Uuid) {
		for _ in 0..200 {
			if let Some(record) = job_engine.status(id) {
				if matches!(record.state, JobState::Success | JobState::Failed) {
					return;
				}
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("job never settled");
	}
}
