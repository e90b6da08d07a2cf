//! HTTP handlers for the tile and capabilities endpoints.
//!
//! Both handlers are thin: validation and caching live in [`crate::engine::TileEngine`]
//! and [`tilefarm_core::KeySpace`]; this module only translates between wire shapes
//! (path/query params, headers, JSON) and the core types.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use parking_lot::Mutex;
use serde::Deserialize;
use time::OffsetDateTime;

use tilefarm_core::json::JsonObject;
use tilefarm_core::{CoreError, KeySpace, Layer, Period, TileRequest, VisParamRegistry};

use crate::engine::TileEngine;

/// State for the tile endpoint.
#[derive(Clone)]
pub struct TileHandlerState {
	pub engine: Arc<TileEngine>,
	pub registry: Arc<dyn VisParamRegistry>,
}

#[derive(Debug, Deserialize)]
pub struct TileQuery {
	pub period: String,
	pub year: u16,
	pub month: Option<u8>,
	pub visparam: String,
}

/// `GET /api/layers/{layer}/{x}/{y}/{z}?period=&year=&month=&visparam=`
pub async fn serve_tile(
	Path((layer, x, y, z)): Path<(String, u32, u32, u8)>,
	Query(query): Query<TileQuery>,
	headers: HeaderMap,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	State(state): State<TileHandlerState>,
) -> Response<Body> {
	let client_identity = client_identity(&headers, addr);

	let result = handle_tile_request(&state, layer, x, y, z, query, &headers, client_identity.as_str()).await;

	match result {
		Ok(resp) => resp,
		Err(err) => error_response(&err),
	}
}

async fn handle_tile_request(
	state: &TileHandlerState,
	layer: String,
	x: u32,
	y: u32,
	z: u8,
	query: TileQuery,
	headers: &HeaderMap,
	client_identity: &str,
) -> Result<Response<Body>, CoreError> {
	// Admission runs before any KeySpace work (spec §4.8): an over-budget client gets
	// throttled without the server ever parsing or validating what it asked for.
	state.engine.admit_edge(client_identity).await?;

	let layer: Layer = layer.parse()?;
	let period: Period = query.period.parse()?;

	let req = TileRequest {
		layer,
		z,
		x,
		y,
		period,
		year: query.year,
		month: query.month,
		visparam: query.visparam,
	};

	let key = KeySpace::canonicalise(&req, state.registry.as_ref())?;

	if let Some(if_none_match) = headers.get_none_match() {
		if if_none_match == key.etag() {
			return Ok(not_modified(&key.etag()));
		}
	}

	let tile = state.engine.get_tile_preadmitted(&req).await?;
	Ok(ok_tile(tile))
}

trait HeaderMapExt {
	fn get_none_match(&self) -> Option<String>;
}

impl HeaderMapExt for HeaderMap {
	fn get_none_match(&self) -> Option<String> {
		self
			.get(header::IF_NONE_MATCH)
			.and_then(|v| v.to_str().ok())
			.map(str::to_owned)
	}
}

fn client_identity(headers: &HeaderMap, addr: SocketAddr) -> String {
	headers
		.get("x-forwarded-for")
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.split(',').next())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.unwrap_or_else(|| addr.ip().to_string())
}

fn ok_tile(tile: crate::engine::TileResponse) -> Response<Body> {
	Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "image/png")
		.header(header::CACHE_CONTROL, "public, max-age=2592000, immutable")
		.header(header::ETAG, tile.etag.clone())
		.header("x-cache", tile.cache_status.as_header_value())
		.body(Body::from(tile.blob.into_vec()))
		.expect("failed to build tile response")
}

fn not_modified(etag: &str) -> Response<Body> {
	Response::builder()
		.status(StatusCode::NOT_MODIFIED)
		.header(header::ETAG, etag)
		.body(Body::empty())
		.expect("failed to build 304 response")
}

/// Maps a [`CoreError`] to its wire form: status code, `Retry-After` where applicable,
/// and a small JSON body. `Internal` never leaks its cause (spec §7).
pub fn error_response(err: &CoreError) -> Response<Body> {
	let mut obj = JsonObject::new();
	if err.is_client_safe() {
		obj.set("error", err.to_string());
	} else {
		obj.set("error", "internal server error");
	}

	let mut builder = Response::builder()
		.status(err.status_code())
		.header(header::CONTENT_TYPE, "application/json");

	if let Some(retry_after) = err.retry_after_secs() {
		builder = builder.header(header::RETRY_AFTER, retry_after.to_string());
	}

	builder
		.body(Body::from(obj.stringify()))
		.expect("failed to build error response")
}

/// In-process short-TTL cache for the `/api/capabilities` snapshot: the registry's
/// `version()` invalidates it, so a refresh never serves stale visparam data for
/// longer than the TTL (spec §6).
pub struct CapabilitiesCache {
	ttl: Duration,
	inner: Mutex<Option<(u64, OffsetDateTime, String)>>,
}

impl CapabilitiesCache {
	#[must_use]
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			inner: Mutex::new(None),
		}
	}

	fn get_or_build(&self, registry: &dyn VisParamRegistry) -> String {
		let version = registry.version();
		let now = OffsetDateTime::now_utc();

		let mut guard = self.inner.lock();
		if let Some((cached_version, cached_at, body)) = guard.as_ref() {
			if *cached_version == version && now - *cached_at < self.ttl {
				return body.clone();
			}
		}

		let body = build_capabilities_json(registry);
		*guard = Some((version, now, body.clone()));
		body
	}
}

fn build_capabilities_json(registry: &dyn VisParamRegistry) -> String {
	let mut layers = JsonObject::new();
	for layer in Layer::all() {
		let layer = *layer;
		let mut entry = JsonObject::new();
		entry.set("min_year", f64::from(layer.min_year()));
		entry.set(
			"periods",
			vec!["WET".to_string(), "DRY".to_string(), "MONTH".to_string()],
		);

		let visparams: Vec<String> = registry
			.all()
			.into_iter()
			.filter(|vp| vp.active && vp.is_compatible(layer))
			.map(|vp| vp.name)
			.collect();
		entry.set("visparams", visparams);

		layers.set(layer.as_str(), entry);
	}

	let mut root = JsonObject::new();
	root.set("layers", layers);
	root.set("capabilities_version", registry.version() as f64);
	root.stringify()
}

/// State for the capabilities endpoint.
#[derive(Clone)]
pub struct CapabilitiesHandlerState {
	pub registry: Arc<dyn VisParamRegistry>,
	pub cache: Arc<CapabilitiesCache>,
}

/// `GET /api/capabilities`
pub async fn serve_capabilities(State(state): State<CapabilitiesHandlerState>) -> Response<Body> {
	let body = state.cache.get_or_build(state.registry.as_ref());
	Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(body))
		.expect("failed to build capabilities response")
}
