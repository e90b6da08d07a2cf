//! Cross-Origin Resource Sharing (CORS) helpers.
//!
//! Supports the following `allowed_origins` patterns (strings):
//! - `"*"`                     → allow all origins
//! - `"*.example.com"`        → suffix match (implemented as `*example.com`)
//! - `"https://example.com*"` → prefix match
//! - `"/^https://(foo|bar)\.example\.com$/"` → custom regex (leading and trailing `/`)
//! - exact strings like `"https://maps.example.org"`
//!
//! The returned [`CorsLayer`] can be added to the Axum router. We only set the origin
//! predicate here to avoid surprising defaults; methods/headers are left to
//! Axum/Tower-HTTP defaults unless extended.

use std::time::Duration;

use anyhow::Result;
use axum::http::{header::HeaderValue, request::Parts};
use regex::Regex;
use tower_http::cors::{AllowOrigin, CorsLayer};

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync + 'static>;

/// Build a `CorsLayer` with a predicate assembled from `allowed_origins`.
///
/// See module docs for supported pattern forms.
pub fn build_cors_layer(allowed_origins: &[String], max_age_seconds: u64) -> Result<CorsLayer> {
	let checks: Vec<Predicate> = allowed_origins
		.iter()
		.map(|pattern| {
			Ok::<Predicate, anyhow::Error>(if pattern == "*" {
				Box::new(|_: &str| true)
			} else if Regex::new(r"^\*[^*]+$")?.is_match(pattern) {
				let suffix = pattern[1..].to_string();
				Box::new(move |origin: &str| origin.ends_with(&suffix))
			} else if Regex::new(r"^[^*]+\*$")?.is_match(pattern) {
				let prefix = pattern[..pattern.len() - 1].to_string();
				Box::new(move |origin: &str| origin.starts_with(&prefix))
			} else if Regex::new(r"^/.+/$")?.is_match(pattern) {
				let re = Regex::new(&pattern[1..pattern.len() - 1])?;
				Box::new(move |origin: &str| re.is_match(origin))
			} else {
				let exact = pattern.clone();
				Box::new(move |origin: &str| origin == exact)
			})
		})
		.collect::<Result<Vec<_>>>()?;

	let layer = CorsLayer::new()
		.allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req: &Parts| {
			let origin_str = origin.to_str().unwrap_or("");
			checks.iter().any(|f| f(origin_str))
		}))
		.max_age(Duration::from_secs(max_age_seconds));

	Ok(layer)
}
