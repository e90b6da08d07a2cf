//! The authenticated ControlPlane (spec §4.11): cache stats, invalidation, warming,
//! and job introspection, gated behind HTTP Basic Auth.
//!
//! Identity and role management are out of scope (spec §1); [`AdminConfig`] names a
//! single operator credential, and `required_role` is carried through only so a
//! future user-store integration has somewhere to plug in a real check.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::body::Body;
use base64::Engine;
use serde::Deserialize;
use uuid::Uuid;

use tilefarm_cache::{BlobStore, CircuitState, Limiter, LocalCache, MetaStore};
use tilefarm_core::json::JsonObject;
use tilefarm_core::{CoreError, GeoBBox, Layer, Period};

use crate::config::AdminConfig;
use crate::engine::TileEngine;
use crate::job::{CampaignStore, JobEngine, JobKind, Priority, WarmCampaign, WarmPoint, WarmRegion};

/// Everything the ControlPlane handlers need, composed once at server startup.
#[derive(Clone)]
pub struct AdminState {
	pub config: AdminConfig,
	pub engine: Arc<TileEngine>,
	pub jobs: Arc<JobEngine>,
	pub campaigns: Arc<dyn CampaignStore>,
	pub blobs: Arc<dyn BlobStore>,
	pub local: Arc<LocalCache>,
	pub meta: Arc<dyn MetaStore>,
	pub limiter: Arc<Limiter>,
}

fn require_auth(state: &AdminState, headers: &HeaderMap) -> Result<(), CoreError> {
	if state.config.disabled.unwrap_or(false) {
		return Err(CoreError::Forbidden);
	}

	let (want_user, want_pass) = match (&state.config.username, &state.config.password) {
		(Some(u), Some(p)) => (u, p),
		_ => return Err(CoreError::Forbidden),
	};

	let header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
	let Some(credentials) = header.and_then(|h| h.strip_prefix("Basic ")) else {
		return Err(CoreError::Unauthorized);
	};

	let decoded = base64::engine::general_purpose::STANDARD
		.decode(credentials)
		.map_err(|_| CoreError::Unauthorized)?;
	let decoded = String::from_utf8(decoded).map_err(|_| CoreError::Unauthorized)?;
	let Some((user, pass)) = decoded.split_once(':') else {
		return Err(CoreError::Unauthorized);
	};

	if user == want_user && pass == want_pass {
		Ok(())
	} else {
		Err(CoreError::Unauthorized)
	}
}

fn error_response(err: &CoreError) -> Response<Body> {
	super::handlers::error_response(err)
}

pub(crate) fn json_response(status: StatusCode, obj: &JsonObject) -> Response<Body> {
	Response::builder()
		.status(status)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(obj.stringify()))
		.expect("failed to build admin JSON response")
}

/// `GET /cache/stats`
pub async fn cache_stats(headers: HeaderMap, State(state): State<AdminState>) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	let mut obj = JsonObject::new();
	obj.set("local_cache_entries", state.local.entry_count().await as f64);
	obj.set("circuit_state", circuit_state_str(state.limiter.circuit_state()));

	json_response(StatusCode::OK, &obj)
}

pub(crate) fn circuit_state_str(state: CircuitState) -> &'static str {
	match state {
		CircuitState::Closed => "closed",
		CircuitState::Open => "open",
		CircuitState::HalfOpen => "half-open",
	}
}

#[derive(Debug, Deserialize)]
pub struct CacheClearQuery {
	pub layer: Option<String>,
	pub year: Option<u16>,
	#[serde(default)]
	pub confirm: bool,
}

/// `DELETE /cache/clear?layer=&year=&confirm=true`
pub async fn cache_clear(
	headers: HeaderMap,
	Query(query): Query<CacheClearQuery>,
	State(state): State<AdminState>,
) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	if !query.confirm {
		return error_response(&CoreError::BadRequest(
			"cache invalidation requires confirm=true".into(),
		));
	}

	let Some(layer_str) = &query.layer else {
		return error_response(&CoreError::BadRequest("layer is required".into()));
	};
	let layer: Layer = match layer_str.parse() {
		Ok(layer) => layer,
		Err(err) => return error_response(&err),
	};

	// Object path layout is `tiles/<layer>/<period>/<year>/...`: a year filter has to
	// fan out over every period since period sits between layer and year.
	let prefixes: Vec<String> = if let Some(year) = query.year {
		["WET", "DRY", "MONTH"]
			.iter()
			.map(|p| format!("tiles/{}/{p}/{year}/", layer.as_str()))
			.collect()
	} else {
		vec![format!("tiles/{}/", layer.as_str())]
	};

	// `MosaicKey::canonical()` is `<layer>|<period>|<year>|...`, the same shape as the
	// blob path above with `|` in place of `/`: reuse the same fan-out so a year filter
	// also clears every period's mosaic handle and coalesce marker, not just the blobs.
	// Without this, `MosaicCache::drive` keeps serving a `Ready` handle straight out of
	// the MetaStore after the blobs it points at are gone.
	let mosaic_prefixes: Vec<String> = if let Some(year) = query.year {
		["WET", "DRY", "MONTH"]
			.iter()
			.map(|p| format!("{}|{p}|{year}|", layer.as_str()))
			.collect()
	} else {
		vec![format!("{}|", layer.as_str())]
	};

	for p in &prefixes {
		if let Err(err) = state.blobs.delete_prefix(p).await {
			return error_response(&CoreError::from(err));
		}
		state.local.invalidate_prefix(p);
	}
	for p in &mosaic_prefixes {
		state.meta.del_prefix(&format!("mosaic:{p}")).await;
		state.meta.del_prefix(&format!("coalesce:{p}")).await;
	}

	let mut obj = JsonObject::new();
	obj.set("cleared_prefixes", prefixes);
	json_response(StatusCode::OK, &obj)
}

#[derive(Debug, Deserialize)]
pub struct WarmupRequest {
	pub layer: String,
	pub region: Option<[f64; 4]>,
	pub years: Vec<u16>,
	pub zooms: Vec<u8>,
	pub visparams: Vec<String>,
	pub period: String,
	pub month: Option<u8>,
	#[serde(default)]
	pub priority: Option<String>,
}

fn parse_priority(text: Option<&str>) -> Priority {
	match text {
		Some("high") => Priority::High,
		Some("low") => Priority::Low,
		Some("maintenance") => Priority::Maintenance,
		_ => Priority::Standard,
	}
}

/// `POST /cache/warmup {layer, region, years, zooms, visparams, period, month?}`
///
/// The spec's minimal body (`{layer, region?, max_tiles, batch_size}`) covers the
/// operator-facing shape; `region` is required here because the JobEngine only knows
/// how to enumerate a bounding box or a single point (spec §4.10), not "the whole
/// layer" as a job kind.
pub async fn cache_warmup(headers: HeaderMap, State(state): State<AdminState>, Json(req): Json<WarmupRequest>) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	let layer: Layer = match req.layer.parse() {
		Ok(layer) => layer,
		Err(err) => return error_response(&err),
	};
	let period: Period = match req.period.parse() {
		Ok(period) => period,
		Err(err) => return error_response(&err),
	};
	let Some([x_min, y_min, x_max, y_max]) = req.region else {
		return error_response(&CoreError::BadRequest("region is required".into()));
	};
	let bbox = match GeoBBox::new(x_min, y_min, x_max, y_max) {
		Ok(bbox) => bbox,
		Err(err) => return error_response(&CoreError::BadRequest(err.to_string())),
	};

	let kind = JobKind::WarmRegion(WarmRegion {
		bbox,
		layers: vec![layer],
		years: req.years,
		zooms: req.zooms,
		visparams: req.visparams,
		period,
		month: req.month,
	});

	match state.jobs.enqueue(kind, parse_priority(req.priority.as_deref())).await {
		Ok(id) => {
			let mut obj = JsonObject::new();
			obj.set("job_id", id.to_string());
			json_response(StatusCode::ACCEPTED, &obj)
		}
		Err(_) => error_response(&CoreError::Throttled { retry_after_secs: 5 }),
	}
}

#[derive(Debug, Deserialize)]
pub struct PointStartRequest {
	pub point_id: String,
	pub lon: f64,
	pub lat: f64,
	pub layers: Vec<String>,
	pub years: Vec<u16>,
	pub visparams: Vec<String>,
	pub period: String,
	pub month: Option<u8>,
}

/// `POST /cache/point/start {point_id, lon, lat, layers, years, visparams, period, month?}`
///
/// `point_id` is an operator-supplied correlation label, logged alongside the job but
/// not otherwise interpreted: standalone points have no backing [`CampaignStore`]
/// record, so status is polled by the `job_id` this call returns, not by `point_id`.
///
/// Zooms are not part of the request body (spec §4.10): point warming always covers
/// the fixed `{12, 13, 14}` set, unlike `warm-region`'s free-list `zooms` parameter.
pub async fn cache_point_start(
	headers: HeaderMap,
	State(state): State<AdminState>,
	Json(req): Json<PointStartRequest>,
) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	let layers: Result<Vec<Layer>, CoreError> = req.layers.iter().map(|l| l.parse()).collect();
	let layers = match layers {
		Ok(layers) => layers,
		Err(err) => return error_response(&err),
	};
	let period: Period = match req.period.parse() {
		Ok(period) => period,
		Err(err) => return error_response(&err),
	};

	log::info!("warming point '{}' at ({}, {})", req.point_id, req.lon, req.lat);

	let kind = JobKind::WarmPoint(WarmPoint {
		lon: req.lon,
		lat: req.lat,
		layers,
		years: req.years,
		visparams: req.visparams,
		period,
		month: req.month,
	});

	match state.jobs.enqueue(kind, Priority::Standard).await {
		Ok(id) => {
			let mut obj = JsonObject::new();
			obj.set("job_id", id.to_string());
			obj.set("point_id", req.point_id);
			json_response(StatusCode::ACCEPTED, &obj)
		}
		Err(_) => error_response(&CoreError::Throttled { retry_after_secs: 5 }),
	}
}

#[derive(Debug, Deserialize)]
pub struct CampaignStartRequest {
	pub campaign_id: String,
	pub batch_size: Option<usize>,
	#[serde(default)]
	pub layers: Vec<String>,
	#[serde(default)]
	pub years: Vec<u16>,
	#[serde(default)]
	pub visparams: Vec<String>,
	#[serde(default = "default_period")]
	pub period: String,
	pub month: Option<u8>,
}

fn default_period() -> String {
	"WET".into()
}

/// `POST /cache/campaign/start {campaign_id, batch_size?}`
///
/// Like `cache_point_start`, zooms are fixed to `{12, 13, 14}` (spec §4.10) rather than
/// accepted from the request body: a campaign is a driven sequence of point-warms.
pub async fn cache_campaign_start(
	headers: HeaderMap,
	State(state): State<AdminState>,
	Json(req): Json<CampaignStartRequest>,
) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	let layers: Result<Vec<Layer>, CoreError> = if req.layers.is_empty() {
		Ok(Layer::all().to_vec())
	} else {
		req.layers.iter().map(|l| l.parse()).collect()
	};
	let layers = match layers {
		Ok(layers) => layers,
		Err(err) => return error_response(&err),
	};
	let period: Period = match req.period.parse() {
		Ok(period) => period,
		Err(err) => return error_response(&err),
	};

	let kind = JobKind::WarmCampaign(WarmCampaign {
		campaign_id: req.campaign_id,
		batch_size: req.batch_size.unwrap_or(10),
		layers,
		years: req.years,
		visparams: req.visparams,
		period,
		month: req.month,
	});

	match state.jobs.enqueue(kind, Priority::Low).await {
		Ok(id) => {
			let mut obj = JsonObject::new();
			obj.set("job_id", id.to_string());
			json_response(StatusCode::ACCEPTED, &obj)
		}
		Err(_) => error_response(&CoreError::Throttled { retry_after_secs: 5 }),
	}
}

/// `GET /cache/point/{id}/status` — `{id}` is the `job_id` returned by `point/start`.
pub async fn cache_point_status(headers: HeaderMap, Path(id): Path<Uuid>, State(state): State<AdminState>) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}
	task_status(&state, id)
}

/// `GET /cache/campaign/{id}/status` — `{id}` is the external `campaign_id`.
pub async fn cache_campaign_status(
	headers: HeaderMap,
	Path(campaign_id): Path<String>,
	State(state): State<AdminState>,
) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	match state.campaigns.progress(&campaign_id).await {
		Ok(progress) => {
			let mut obj = JsonObject::new();
			obj.set("total_points", progress.total_points as f64);
			obj.set("cached_points", progress.cached_points as f64);
			obj.set("cache_percentage", progress.cache_percentage());
			obj.set("caching_in_progress", progress.caching_in_progress);
			obj.set("caching_completed", progress.caching_completed);
			obj.set_optional("caching_error", &progress.caching_error);
			json_response(StatusCode::OK, &obj)
		}
		Err(err) => error_response(&CoreError::from(err)),
	}
}

/// `GET /tasks/{id}`
pub async fn task_status_handler(headers: HeaderMap, Path(id): Path<Uuid>, State(state): State<AdminState>) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}
	task_status(&state, id)
}

fn task_status(state: &AdminState, id: Uuid) -> Response<Body> {
	match state.jobs.status(id) {
		Some(record) => {
			let mut obj = JsonObject::new();
			obj.set("id", record.id.to_string());
			obj.set("kind", record.kind_label);
			obj.set("priority", priority_str(record.priority));
			obj.set("state", job_state_str(record.state));
			obj.set("total", record.counters.total as f64);
			obj.set("done", record.counters.done as f64);
			obj.set("failed", record.counters.failed as f64);
			obj.set_optional("last_error", &record.last_error);
			json_response(StatusCode::OK, &obj)
		}
		None => error_response(&CoreError::NotFound(format!("job '{id}' not found"))),
	}
}

fn priority_str(priority: Priority) -> &'static str {
	match priority {
		Priority::High => "high",
		Priority::Standard => "standard",
		Priority::Low => "low",
		Priority::Maintenance => "maintenance",
	}
}

fn job_state_str(state: crate::job::JobState) -> &'static str {
	use crate::job::JobState;
	match state {
		JobState::Pending => "pending",
		JobState::Running => "running",
		JobState::Success => "success",
		JobState::Failed => "failed",
		JobState::Cancelled => "cancelled",
	}
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
	pub queue: String,
}

/// `POST /tasks/purge?queue=`
pub async fn tasks_purge(headers: HeaderMap, Query(query): Query<PurgeQuery>, State(state): State<AdminState>) -> Response<Body> {
	if let Err(err) = require_auth(&state, &headers) {
		return error_response(&err);
	}

	let priority = match query.queue.as_str() {
		"high" => Priority::High,
		"standard" => Priority::Standard,
		"low" => Priority::Low,
		"maintenance" => Priority::Maintenance,
		other => return error_response(&CoreError::BadRequest(format!("unknown queue '{other}'"))),
	};

	let purged = state.jobs.purge_queue(priority).await;
	let mut obj = JsonObject::new();
	obj.set("purged", purged as f64);
	json_response(StatusCode::OK, &obj)
}
