//! Router composition: wires handlers into an Axum `Router` without mixing in
//! server lifecycle or CORS logic.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::{delete, get, post};
use tilefarm_derive::context;

use super::admin::{self, AdminState};
use super::handlers::{self, CapabilitiesCache, CapabilitiesHandlerState, TileHandlerState};
use crate::engine::TileEngine;
use tilefarm_core::VisParamRegistry;

/// Attaches the public tile and capabilities endpoints.
#[context("adding tile routes to app")]
pub fn add_tile_routes_to_app(
	app: Router,
	engine: Arc<TileEngine>,
	registry: Arc<dyn VisParamRegistry>,
	capabilities_ttl: std::time::Duration,
) -> Result<Router> {
	let tile_state = TileHandlerState {
		engine,
		registry: registry.clone(),
	};
	let tile_router = Router::new()
		.route("/api/layers/{layer}/{x}/{y}/{z}", get(handlers::serve_tile))
		.with_state(tile_state);

	let capabilities_state = CapabilitiesHandlerState {
		registry,
		cache: Arc::new(CapabilitiesCache::new(capabilities_ttl)),
	};
	let capabilities_router = Router::new()
		.route("/api/capabilities", get(handlers::serve_capabilities))
		.with_state(capabilities_state);

	Ok(app.merge(tile_router).merge(capabilities_router))
}

/// Attaches the authenticated ControlPlane endpoints (spec §4.11).
#[context("adding admin routes to app")]
pub fn add_admin_routes_to_app(app: Router, state: AdminState) -> Result<Router> {
	let admin_router = Router::new()
		.route("/cache/stats", get(admin::cache_stats))
		.route("/cache/clear", delete(admin::cache_clear))
		.route("/cache/warmup", post(admin::cache_warmup))
		.route("/cache/point/start", post(admin::cache_point_start))
		.route("/cache/point/{id}/status", get(admin::cache_point_status))
		.route("/cache/campaign/start", post(admin::cache_campaign_start))
		.route("/cache/campaign/{id}/status", get(admin::cache_campaign_status))
		.route("/tasks/{id}", get(admin::task_status_handler))
		.route("/tasks/purge", post(admin::tasks_purge))
		.with_state(state);

	Ok(app.merge(admin_router))
}
