//! High-level server configuration loader for Tile Farm.
//!
//! This module defines the top-level [`Config`] struct and helpers to parse YAML from
//! strings, readers, or file paths, plus [`Config::apply_env_overrides`], the
//! lowest-priority environment-variable layer spec §6 enumerates.
//!
//! ## YAML shape
//!
//! ```yaml
//! # Optional HTTP server configuration
//! server:
//!   ip: 0.0.0.0
//!   port: 8080
//!   request_deadline_ms: 30000    # optional
//!   disable_api: false            # optional
//!
//! # Optional Cross-Origin Resource Sharing (CORS) settings
//! cors:
//!   allowed_origins:
//!     - https://example.org
//!     - "*.example.net"
//!   max_age_seconds: 86400         # optional
//!
//! # Optional extra HTTP response headers
//! extra_response_headers:
//!   Cache-Control: "public, max-age=86400, immutable"
//!   CDN-Cache-Control: "max-age=604800"
//!
//! # Optional cache sizing and storage location
//! cache:
//!   blob_store_root: ./data/tiles
//!   mosaic_ttl_hours: 24
//!   tile_blob_ttl_days: 30
//!   local_cache_bytes: 536870912
//!
//! # Optional Earth-imagery backend endpoint
//! upstream:
//!   mosaic_endpoint: "https://imagery.internal/mosaic"
//!   request_timeout_ms: 30000
//!
//! # Optional edge/upstream rate limiting
//! limiter:
//!   edge_rate_per_minute: 100000
//!   edge_burst: 10000
//!   upstream_concurrency: 25
//!   upstream_pacing_ms: 50
//!
//! # Optional cache-warming job pool
//! job:
//!   worker_count: 8
//!   queue_capacity: 1000
//!
//! # Optional control-plane authentication
//! admin:
//!   username: admin
//!   password: change-me
//!   required_role: super-admin
//!   disabled: false
//! ```
//!
//! ## Basic usage
//! Reading from a file:
//! ```no_run
//! use std::path::Path;
//! use tilefarm::config::Config;
//! let mut cfg = Config::from_path(Path::new("server.yml")).expect("config");
//! cfg.apply_env_overrides();
//! ```
//! Parsing from a string (e.g., tests):
//! ```no_run
//! use tilefarm::config::Config;
//! let cfg = Config::from_string("server:\n  port: 9000").unwrap();
//! ```
use super::{AdminConfig, CacheConfig, CorsConfig, JobConfig, LimiterConfig, ServerConfig, UpstreamConfig};
use anyhow::Result;
use serde::Deserialize;
use std::{
	collections::HashMap,
	fs::File,
	io::{BufReader, Read},
	path::Path,
};
use tilefarm_derive::ConfigDoc;
use tilefarm_derive::context;

/// Top-level server configuration.
///
/// All sections are **optional** and default to empty values. Missing sections are treated
/// as if present with defaults.
///
/// See the module-level docs for a full YAML example.
#[derive(Default, Debug, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Optional HTTP server configuration
	#[serde(default)]
	pub server: ServerConfig,

	/// Optional Cross-Origin Resource Sharing (CORS) settings
	#[serde(default)]
	pub cors: CorsConfig,

	/// Optional extra HTTP response headers to add to every response
	/// For example, cache control or timing headers
	#[serde(default)]
	#[config_demo(
		r#"
  Cache-Control: public, max-age=86400, immutable
  CDN-Cache-Control: max-age=604800"#
	)]
	pub extra_response_headers: HashMap<String, String>,

	/// Optional cache sizing and storage location
	#[serde(default)]
	pub cache: CacheConfig,

	/// Optional Earth-imagery backend endpoint
	#[serde(default)]
	pub upstream: UpstreamConfig,

	/// Optional edge/upstream rate limiting
	#[serde(default)]
	pub limiter: LimiterConfig,

	/// Optional cache-warming job pool
	#[serde(default)]
	pub job: JobConfig,

	/// Optional control-plane authentication
	#[serde(default)]
	pub admin: AdminConfig,
}

impl Config {
	/// Parse a YAML config from any `Read` implementor.
	///
	/// Useful when loading from in-memory buffers or network streams.
	/// Errors include a contextual message with the operation being performed.
	#[context("parsing config from reader (YAML)")]
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	/// Parse a YAML config from a string slice.
	///
	/// Convenience for tests and simple setups.
	#[context("parsing config from string (YAML)")]
	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	/// Parse from a file path.
	#[context("reading config file '{}'", path.display())]
	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path)?;
		Config::from_reader(BufReader::new(file))
	}

	/// Fills every field still unset after file/CLI layering from the environment
	/// variables spec §6 enumerates. This is the lowest-priority layer: a value
	/// already present (from the config file or a CLI override) is left untouched.
	pub fn apply_env_overrides(&mut self) {
		fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
			std::env::var(key).ok().and_then(|v| v.parse().ok())
		}

		if self.server.port.is_none() {
			self.server.port = env_parse("PORT");
		}
		if self.server.request_deadline_ms.is_none() {
			self.server.request_deadline_ms = env_parse("REQUEST_DEADLINE_MS");
		}
		if self.cache.mosaic_ttl_hours.is_none() {
			self.cache.mosaic_ttl_hours = env_parse("MOSAIC_TTL_HOURS");
		}
		if self.cache.tile_blob_ttl_days.is_none() {
			self.cache.tile_blob_ttl_days = env_parse("TILE_BLOB_TTL_DAYS");
		}
		if self.cache.local_cache_bytes.is_none() {
			self.cache.local_cache_bytes = env_parse("LOCAL_CACHE_BYTES");
		}
		if self.limiter.upstream_concurrency.is_none() {
			self.limiter.upstream_concurrency = env_parse("UPSTREAM_CONCURRENCY");
		}
		if self.limiter.upstream_pacing_ms.is_none() {
			self.limiter.upstream_pacing_ms = env_parse("UPSTREAM_PACING_MS");
		}
		if self.limiter.edge_rate_per_minute.is_none() {
			self.limiter.edge_rate_per_minute = env_parse("EDGE_RATE_PER_MINUTE");
		}
		if self.limiter.edge_burst.is_none() {
			self.limiter.edge_burst = env_parse("EDGE_BURST");
		}
		if self.job.worker_count.is_none() {
			self.job.worker_count = env_parse("JOB_POOL_SIZE");
		}
		if self.admin.required_role.is_none() {
			self.admin.required_role = std::env::var("ADMIN_REQUIRED_ROLE").ok();
		}
	}

	/// Render Markdown help: the field table followed by a fenced YAML demo block.
	///
	/// This is consumed by UIs or `--help` outputs that want embedded examples.
	#[must_use]
	pub fn help_md() -> String {
		[
			Self::md().trim(),
			"\n```yaml",
			Self::demo_yaml_with_indent(0).trim(),
			"```",
		]
		.join("\n")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn parse_empty_config() {
		assert_eq!(Config::from_string("").unwrap(), Config::default());
	}

	#[test]
	fn parse_invalid_config() {
		let cfg = Config::from_string("server:\n  pi: 3.14.15.9");
		assert_eq!(
			cfg.unwrap_err().chain().map(|e| e.to_string()).collect::<Vec<_>>(),
			vec![
				"parsing config from string (YAML)",
				"server: unknown field `pi`, expected one of `ip`, `port`, `request_deadline_ms`, `disable_api` at line 2 column 3"
			]
		);
	}

	#[test]
	fn parse_full_config() {
		let yaml = r#"
server:
  ip: 127.0.0.1
  port: 51234
  request_deadline_ms: 15000
  disable_api: true
cors:
  allowed_origins: ["https://example.org", "*.other-example.org"]
  max_age_seconds: 86400
extra_response_headers:
  Timing-Allow-Origin: "*"
cache:
  blob_store_root: /data/tiles
  mosaic_ttl_hours: 12
  tile_blob_ttl_days: 14
  local_cache_bytes: 1048576
upstream:
  mosaic_endpoint: "https://imagery.example.org/mosaic"
  request_timeout_ms: 5000
limiter:
  edge_rate_per_minute: 1000
  edge_burst: 100
  upstream_concurrency: 4
  upstream_pacing_ms: 25
job:
  worker_count: 4
  queue_capacity: 100
admin:
  username: admin
  password: secret
  required_role: super-admin
  disabled: false
"#;
		let cfg = Config::from_string(yaml).unwrap();

		assert_eq!(cfg.server.port, Some(51234));
		assert_eq!(cfg.server.request_deadline_ms, Some(15000));
		assert_eq!(cfg.cors.allowed_origins, vec!["https://example.org", "*.other-example.org"]);
		assert_eq!(cfg.cache.blob_store_root.as_deref(), Some("/data/tiles"));
		assert_eq!(cfg.cache.mosaic_ttl_hours, Some(12));
		assert_eq!(cfg.upstream.mosaic_endpoint.as_deref(), Some("https://imagery.example.org/mosaic"));
		assert_eq!(cfg.limiter.upstream_concurrency, Some(4));
		assert_eq!(cfg.job.worker_count, Some(4));
		assert_eq!(cfg.admin.required_role.as_deref(), Some("super-admin"));
	}

	#[test]
	fn parse_demo_config_round_trips() {
		let yaml = Config::demo_yaml_with_indent(0);
		let cfg = Config::from_string(&yaml).unwrap();

		assert_eq!(cfg.server.ip.as_deref(), Some("0.0.0.0"));
		assert_eq!(cfg.server.port, Some(8080));
		assert_eq!(cfg.server.request_deadline_ms, Some(30000));
		assert_eq!(cfg.cache.mosaic_ttl_hours, Some(24));
		assert_eq!(cfg.cache.tile_blob_ttl_days, Some(30));
		assert_eq!(cfg.cache.local_cache_bytes, Some(536870912));
		assert_eq!(cfg.limiter.upstream_concurrency, Some(25));
		assert_eq!(cfg.limiter.upstream_pacing_ms, Some(50));
		assert_eq!(cfg.job.worker_count, Some(8));
		assert_eq!(cfg.admin.required_role.as_deref(), Some("super-admin"));
	}

	#[test]
	fn env_overrides_only_fill_unset_fields() {
		let mut cfg = Config::from_string("server:\n  port: 9000").unwrap();
		std::env::set_var("PORT", "7000");
		std::env::set_var("MOSAIC_TTL_HOURS", "48");
		cfg.apply_env_overrides();
		std::env::remove_var("PORT");
		std::env::remove_var("MOSAIC_TTL_HOURS");

		assert_eq!(cfg.server.port, Some(9000));
		assert_eq!(cfg.cache.mosaic_ttl_hours, Some(48));
	}
}
