//! Earth-imagery backend configuration for the Tile Farm server.
//!
//! This module defines the [`UpstreamConfig`] struct, which points the
//! [`tilefarm_cache::HttpUpstreamClient`] at the mosaic-build endpoint and bounds how
//! long a single upstream call may take.
//!
//! # Example YAML
//! ```yaml
//! upstream:
//!   mosaic_endpoint: "https://imagery.internal/mosaic"
//!   request_timeout_ms: 30000
//! ```
//!
//! All fields are optional. Defaults are applied when values are not specified.

use serde::Deserialize;
use tilefarm_derive::ConfigDoc;

/// Configuration for the Earth-imagery compute backend adapter (spec §4.5).
///
/// * `mosaic_endpoint` — URL the mosaic-build request is issued against.
/// * `request_timeout_ms` — Per-call timeout handed to the `reqwest::Client`.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
	/// Optional URL of the mosaic-build endpoint on the Earth-imagery backend
	/// Defaults to "http://localhost:9000/mosaic"
	#[serde()]
	#[config_demo("http://localhost:9000/mosaic")]
	pub mosaic_endpoint: Option<String>,

	/// Optional per-call timeout, in milliseconds, for upstream requests
	/// Defaults to 30000
	#[serde()]
	#[config_demo("30000")]
	pub request_timeout_ms: Option<u64>,
}

/// Helper methods for merging partial `UpstreamConfig` values.
impl UpstreamConfig {
	pub fn override_optional_mosaic_endpoint(&mut self, mosaic_endpoint: &Option<String>) {
		if mosaic_endpoint.is_some() {
			self.mosaic_endpoint.clone_from(mosaic_endpoint);
		}
	}
	pub fn override_optional_request_timeout_ms(&mut self, request_timeout_ms: &Option<u64>) {
		if request_timeout_ms.is_some() {
			self.request_timeout_ms = *request_timeout_ms;
		}
	}
}
