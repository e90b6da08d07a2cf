//! HTTP server lifecycle and composition.
//!
//! Owns *lifecycle* concerns only: building the cache/engine stack from [`Config`],
//! composing the router, applying cross-cutting middleware (CORS, backpressure,
//! timeouts, panic catching), listening on a socket, and graceful shutdown. The
//! *logic* lives in `handlers`/`routes`/`admin`; this module wires it together the
//! way `versatiles::server::tile_server` wires its own handlers/routes modules.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::error_handling::HandleErrorLayer;
use axum::extract::State as AxumState;
use axum::{BoxError, Router, response::IntoResponse, routing::get};
use tilefarm_core::json::JsonObject;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::{ServiceBuilder, buffer::BufferLayer, limit::ConcurrencyLimitLayer, load_shed::LoadShedLayer, timeout::TimeoutLayer};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use tilefarm_cache::{
	FsBlobStore, HttpUpstreamClient, InProcessMetaStore, Limiter, LimiterConfig as CacheLimiterConfig, LocalCache, MetaStore,
	MosaicCache, MosaicCacheConfig,
};
use tilefarm_core::ConcurrencyLimits;
use tilefarm_core::visparam::StaticVisParamRegistry;
use tilefarm_core::VisParamRegistry;
use tilefarm_derive::context;

use super::{admin, cors, routes};
use crate::config::Config;
use crate::engine::{RetryConfig, TileEngine};
use crate::job::{CampaignStore, InMemoryCampaignStore, JobEngine};

/// How long an L1 `LocalCache` entry is trusted before re-fetch; deliberately short
/// and fixed rather than config-driven, since staleness beyond it is already bounded
/// by the BlobStore/MosaicCache TTLs underneath.
const LOCAL_CACHE_TTL: Duration = Duration::from_secs(600);

/// How long a `/api/capabilities` snapshot is served before the registry is
/// re-consulted, independent of `version()` bumps.
const CAPABILITIES_TTL: Duration = Duration::from_secs(30);

/// Liveness probe, extended beyond a bare "ready!" to surface the one fail-open
/// signal an operator can act on at a glance: whether the upstream circuit
/// breaker has tripped (spec §7's degrade-open state).
async fn status_probe(AxumState(limiter): AxumState<Arc<Limiter>>) -> axum::response::Response {
	let mut obj = JsonObject::new();
	obj.set("status", "ready");
	obj.set("circuit_state", admin::circuit_state_str(limiter.circuit_state()));
	admin::json_response(StatusCode::OK, &obj)
}

/// Thin orchestration layer for the tile farm HTTP server.
///
/// - **Idempotent start/stop**: starting twice stops the previous instance first.
/// - **Graceful shutdown**: in-flight requests finish, up to a timeout.
/// - **Backpressure by default**: global limits sized off the host's CPU count
///   protect the process from overload (spec §10.5) rather than a fixed magic number.
pub struct TileFarmServer {
	ip: String,
	port: u16,
	request_deadline: Duration,
	disable_api: bool,
	engine: Arc<TileEngine>,
	jobs: Arc<JobEngine>,
	registry: Arc<dyn VisParamRegistry>,
	admin_state: admin::AdminState,
	cors_allowed_origins: Vec<String>,
	cors_max_age_seconds: u64,
	extra_response_headers: Vec<(HeaderName, HeaderValue)>,
	exit_signal: Option<oneshot::Sender<()>>,
	join: Option<tokio::task::JoinHandle<()>>,
}

impl TileFarmServer {
	/// Builds every layer of the cache/engine stack from `config` and wires them into
	/// a server ready to [`start`](Self::start).
	#[context("building tile farm server from config")]
	pub async fn from_config(config: Config) -> Result<TileFarmServer> {
		let mut parsed_headers: Vec<(HeaderName, HeaderValue)> = Vec::new();
		for (k, v) in &config.extra_response_headers {
			let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| anyhow::anyhow!("invalid header name {k:?}: {e}"))?;
			let value = HeaderValue::from_str(v).map_err(|e| anyhow::anyhow!("invalid header value for {k:?}: {e}"))?;
			parsed_headers.push((name, value));
		}

		let meta: Arc<dyn MetaStore> = Arc::new(InProcessMetaStore::new());

		let blob_root = config.cache.blob_store_root.clone().unwrap_or_else(|| "./data/tiles".into());
		let blobs = Arc::new(FsBlobStore::new(blob_root));

		let local_bytes = config.cache.local_cache_bytes.unwrap_or(512 * 1024 * 1024);
		let local = Arc::new(LocalCache::new(local_bytes, LOCAL_CACHE_TTL));

		let mosaic_endpoint = config
			.upstream
			.mosaic_endpoint
			.clone()
			.unwrap_or_else(|| "http://localhost:9000/mosaic".into());
		let request_timeout = Duration::from_millis(config.upstream.request_timeout_ms.unwrap_or(30_000));
		let upstream = Arc::new(HttpUpstreamClient::new(mosaic_endpoint, request_timeout)?);

		let mosaic_ttl_hours = config.cache.mosaic_ttl_hours.unwrap_or(24);
		let mosaic_config = MosaicCacheConfig {
			ready_ttl: Duration::from_secs(mosaic_ttl_hours * 3600),
			..MosaicCacheConfig::default()
		};
		let mosaics = Arc::new(MosaicCache::new(meta.clone(), upstream.clone(), mosaic_config));

		let limiter_config = CacheLimiterConfig {
			edge_rate_per_sec: config.limiter.edge_rate_per_minute.unwrap_or(100_000) as f64 / 60.0,
			edge_capacity: config.limiter.edge_burst.unwrap_or(10_000) as f64,
			upstream_concurrency: config.limiter.upstream_concurrency.unwrap_or(25) as usize,
			upstream_min_interval: Duration::from_millis(config.limiter.upstream_pacing_ms.unwrap_or(50)),
			..CacheLimiterConfig::default()
		};
		let limiter = Arc::new(Limiter::new(meta.clone(), limiter_config));

		let registry: Arc<dyn VisParamRegistry> = Arc::new(StaticVisParamRegistry::new(Vec::new()));

		let engine = Arc::new(
			TileEngine::new(
				blobs.clone(),
				local.clone(),
				mosaics,
				limiter.clone(),
				upstream,
				registry.clone(),
			)
			.with_retry(RetryConfig::default()),
		);

		let campaigns: Arc<dyn CampaignStore> = Arc::new(InMemoryCampaignStore::new());
		let worker_count = config.job.worker_count.unwrap_or(8);
		let queue_capacity = config.job.queue_capacity.unwrap_or(1000);
		let jobs = JobEngine::new(engine.clone(), campaigns.clone(), worker_count, queue_capacity);

		let admin_state = admin::AdminState {
			config: config.admin.clone(),
			engine: engine.clone(),
			jobs: jobs.clone(),
			campaigns,
			blobs,
			local,
			meta,
			limiter,
		};

		Ok(TileFarmServer {
			ip: config.server.ip.unwrap_or_else(|| "0.0.0.0".into()),
			port: config.server.port.unwrap_or(8080),
			request_deadline: Duration::from_millis(config.server.request_deadline_ms.unwrap_or(30_000)),
			disable_api: config.server.disable_api.unwrap_or(false),
			engine,
			jobs,
			registry,
			admin_state,
			cors_allowed_origins: config.cors.allowed_origins.clone(),
			cors_max_age_seconds: config.cors.max_age_seconds.unwrap_or(86_400),
			extra_response_headers: parsed_headers,
			exit_signal: None,
			join: None,
		})
	}

	/// Start listening and serving requests.
	///
	/// Idempotent: if already running, the previous instance is stopped first.
	#[context("starting tile farm server")]
	pub async fn start(&mut self) -> Result<()> {
		if self.exit_signal.is_some() || self.join.is_some() {
			self.stop().await;
		}

		log::info!("starting server");

		let mut router = Router::new()
			.route("/status", get(status_probe))
			.with_state(self.admin_state.limiter.clone());
		if !self.disable_api {
			router = routes::add_tile_routes_to_app(router, self.engine.clone(), self.registry.clone(), CAPABILITIES_TTL)?;
		}
		router = routes::add_admin_routes_to_app(router, self.admin_state.clone())?;

		let cors_layer = cors::build_cors_layer(&self.cors_allowed_origins, self.cors_max_age_seconds)?;
		router = router.layer(ServiceBuilder::new().layer(cors_layer));

		for (name, value) in self.extra_response_headers.iter().cloned() {
			router = router.layer(SetResponseHeaderLayer::overriding(name, value));
		}

		// Global backpressure & protection layers, innermost to outermost:
		//   LoadShed → ConcurrencyLimit → Buffer → Timeout → CatchPanic → HandleError
		// Sized off CPU count (spec §10.5) rather than a fixed constant: the hot path
		// is I/O-bound (MetaStore/BlobStore/upstream calls), so `io_bound` applies.
		let limits = ConcurrencyLimits::default();
		let global_concurrency = limits.io_bound;
		let global_buffer = limits.io_bound * 2;

		let overload_handler = HandleErrorLayer::new(|_err: BoxError| async move {
			let mut resp = (StatusCode::SERVICE_UNAVAILABLE, "Service overloaded, try later").into_response();
			resp.headers_mut().insert("Retry-After", "2".parse().unwrap());
			Ok::<_, std::convert::Infallible>(resp)
		});

		let protection = ServiceBuilder::new()
			.layer(overload_handler)
			.layer(CatchPanicLayer::new())
			.layer(TimeoutLayer::new(self.request_deadline))
			.layer(BufferLayer::new(global_buffer))
			.layer(ConcurrencyLimitLayer::new(global_concurrency))
			.layer(LoadShedLayer::new());

		router = router.layer(protection);

		let addr = format!("{}:{}", self.ip, self.port);
		log::info!("server binding on {addr}");

		let listener = TcpListener::bind(&addr).await?;
		if self.port == 0 {
			self.port = listener.local_addr()?.port();
		}
		let (tx, rx) = oneshot::channel::<()>();

		let handle = tokio::spawn(async move {
			let make_service = router.into_make_service_with_connect_info::<SocketAddr>();
			if let Err(err) = axum::serve(listener, make_service)
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await
			{
				log::error!("server task exited with error: {err}");
			}
		});

		self.exit_signal = Some(tx);
		self.join = Some(handle);

		Ok(())
	}

	/// Trigger graceful shutdown and wait for the server task to finish (with timeout).
	///
	/// Idempotent: a no-op if the server is not running.
	pub async fn stop(&mut self) {
		if self.exit_signal.is_none() && self.join.is_none() {
			return;
		}

		log::info!("stopping server");

		if let Some(tx) = self.exit_signal.take() {
			let _ = tx.send(());
		}

		if let Some(handle) = self.join.take() {
			match tokio::time::timeout(Duration::from_secs(10), handle).await {
				Ok(join_result) => {
					if let Err(join_err) = join_result {
						log::warn!("server task join error: {join_err}");
					}
				}
				Err(_) => log::warn!("server task did not shut down within timeout; continuing"),
			}
		}
	}

	#[must_use]
	pub fn get_port(&self) -> u16 {
		self.port
	}

	#[must_use]
	pub fn job_engine(&self) -> Arc<JobEngine> {
		self.jobs.clone()
	}
}
