//! Cache sizing and storage location configuration for the Tile Farm server.
//!
//! This module defines the [`CacheConfig`] struct, which sizes the durable object
//! store, the optional in-process LRU, and the TTLs of the records the hot path
//! writes through them (spec §6's `MOSAIC_TTL_HOURS`, `TILE_BLOB_TTL_DAYS`,
//! `LOCAL_CACHE_BYTES`).
//!
//! # Example YAML
//! ```yaml
//! cache:
//!   blob_store_root: ./data/tiles
//!   mosaic_ttl_hours: 24
//!   tile_blob_ttl_days: 30
//!   local_cache_bytes: 536870912
//! ```
//!
//! All fields are optional. Defaults are applied when values are not specified.

use serde::Deserialize;
use tilefarm_derive::ConfigDoc;

/// Configuration for the two-tier cache (spec §4.2-§4.3, §4.7).
///
/// * `blob_store_root` — Filesystem root the reference `BlobStore` writes PNGs under.
/// * `mosaic_ttl_hours` — How long a `Ready` mosaic handle is trusted (`MOSAIC_TTL_HOURS`).
/// * `tile_blob_ttl_days` — Retention hint passed to `BlobStore::put` (`TILE_BLOB_TTL_DAYS`).
/// * `local_cache_bytes` — Byte budget for the in-process LRU (`LOCAL_CACHE_BYTES`).
#[derive(Debug, Default, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
	/// Optional filesystem root for the rendered-tile object store
	/// Defaults to "./data/tiles"
	#[serde()]
	#[config_demo("./data/tiles")]
	pub blob_store_root: Option<String>,

	/// Optional validity window, in hours, for a built mosaic's URL template
	/// Defaults to 24
	#[serde()]
	#[config_demo("24")]
	pub mosaic_ttl_hours: Option<u64>,

	/// Optional retention, in days, for rendered tile bytes
	/// Defaults to 30
	#[serde()]
	#[config_demo("30")]
	pub tile_blob_ttl_days: Option<u64>,

	/// Optional byte budget for the in-process LRU
	/// Defaults to 536870912 (512 MiB)
	#[serde()]
	#[config_demo("536870912")]
	pub local_cache_bytes: Option<u64>,
}

/// Helper methods for merging partial `CacheConfig` values.
impl CacheConfig {
	pub fn override_optional_blob_store_root(&mut self, blob_store_root: &Option<String>) {
		if blob_store_root.is_some() {
			self.blob_store_root.clone_from(blob_store_root);
		}
	}
	pub fn override_optional_mosaic_ttl_hours(&mut self, mosaic_ttl_hours: &Option<u64>) {
		if mosaic_ttl_hours.is_some() {
			self.mosaic_ttl_hours = *mosaic_ttl_hours;
		}
	}
	pub fn override_optional_tile_blob_ttl_days(&mut self, tile_blob_ttl_days: &Option<u64>) {
		if tile_blob_ttl_days.is_some() {
			self.tile_blob_ttl_days = *tile_blob_ttl_days;
		}
	}
	pub fn override_optional_local_cache_bytes(&mut self, local_cache_bytes: &Option<u64>) {
		if local_cache_bytes.is_some() {
			self.local_cache_bytes = *local_cache_bytes;
		}
	}
}
