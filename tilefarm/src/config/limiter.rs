//! Rate limiting and upstream protection configuration for the Tile Farm server.
//!
//! This module defines the [`LimiterConfig`] struct feeding
//! [`tilefarm_cache::LimiterConfig`]: the edge token bucket (spec `EDGE_RATE_PER_MINUTE`,
//! `EDGE_BURST`) and the upstream concurrency/pacing/circuit-breaker window
//! (spec `UPSTREAM_CONCURRENCY`, `UPSTREAM_PACING_MS`).
//!
//! # Example YAML
//! ```yaml
//! limiter:
//!   edge_rate_per_minute: 100000
//!   edge_burst: 10000
//!   upstream_concurrency: 25
//!   upstream_pacing_ms: 50
//! ```
//!
//! All fields are optional. Defaults are applied when values are not specified.

use serde::Deserialize;
use tilefarm_derive::ConfigDoc;

/// Configuration for the edge and upstream limiters (spec §4.8).
///
/// * `edge_rate_per_minute` — Refill rate of a client identity's token bucket.
/// * `edge_burst` — Burst capacity of a client identity's token bucket.
/// * `upstream_concurrency` — Concurrent `UpstreamClient.build_mosaic` calls allowed.
/// * `upstream_pacing_ms` — Minimum spacing enforced between upstream call starts.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
	/// Optional refill rate, in tokens per minute, for a client identity's edge bucket
	/// Defaults to 100000
	#[serde()]
	#[config_demo("100000")]
	pub edge_rate_per_minute: Option<u64>,

	/// Optional burst capacity for a client identity's edge bucket
	/// Defaults to 10000
	#[serde()]
	#[config_demo("10000")]
	pub edge_burst: Option<u64>,

	/// Optional maximum number of concurrent upstream mosaic builds
	/// Defaults to 25
	#[serde()]
	#[config_demo("25")]
	pub upstream_concurrency: Option<u64>,

	/// Optional minimum spacing, in milliseconds, between upstream call starts
	/// Defaults to 50
	#[serde()]
	#[config_demo("50")]
	pub upstream_pacing_ms: Option<u64>,
}

/// Helper methods for merging partial `LimiterConfig` values.
impl LimiterConfig {
	pub fn override_optional_edge_rate_per_minute(&mut self, edge_rate_per_minute: &Option<u64>) {
		if edge_rate_per_minute.is_some() {
			self.edge_rate_per_minute = *edge_rate_per_minute;
		}
	}
	pub fn override_optional_edge_burst(&mut self, edge_burst: &Option<u64>) {
		if edge_burst.is_some() {
			self.edge_burst = *edge_burst;
		}
	}
	pub fn override_optional_upstream_concurrency(&mut self, upstream_concurrency: &Option<u64>) {
		if upstream_concurrency.is_some() {
			self.upstream_concurrency = *upstream_concurrency;
		}
	}
	pub fn override_optional_upstream_pacing_ms(&mut self, upstream_pacing_ms: &Option<u64>) {
		if upstream_pacing_ms.is_some() {
			self.upstream_pacing_ms = *upstream_pacing_ms;
		}
	}
}
