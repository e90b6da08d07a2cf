//! Adapter over the satellite-mosaic rendering backend (spec §4.7, §1's "Sources").
//!
//! `UpstreamClient` is the seam the rest of the crate is tested against; the `reqwest`
//! implementation is the only piece that actually leaves the process.

use async_trait::async_trait;
use std::time::Duration;
use tilefarm_core::{Blob, MosaicKey, TileKey};

/// Failure modes the limiter and mosaic cache need to distinguish (spec §4.7, §4.8).
#[derive(Debug, Clone)]
pub enum UpstreamError {
	/// Worth retrying shortly: connection reset, 5xx, timeout.
	Transient(String),
	/// Will never succeed as asked: 4xx other than throttling.
	Permanent(String),
	/// The upstream itself is rate-limiting us; distinct from `Transient` so the
	/// circuit breaker and pacing can react without counting it as a fault (spec §4.8).
	Quota(String),
}

impl UpstreamError {
	#[must_use]
	pub fn is_fault(&self) -> bool {
		matches!(self, UpstreamError::Transient(_) | UpstreamError::Permanent(_))
	}
}

impl std::fmt::Display for UpstreamError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			UpstreamError::Transient(msg) => write!(f, "transient upstream error: {msg}"),
			UpstreamError::Permanent(msg) => write!(f, "permanent upstream error: {msg}"),
			UpstreamError::Quota(msg) => write!(f, "upstream quota exceeded: {msg}"),
		}
	}
}

impl std::error::Error for UpstreamError {}

/// Outcome of building a mosaic: the URL template future tile fetches are served from.
#[derive(Debug, Clone)]
pub struct UpstreamOutcome {
	pub url_template: String,
}

/// Everything the rest of the crate needs from the rendering backend.
///
/// `build_mosaic` is the expensive, coalesced call (spec §4.6: one caller per mosaic key
/// drives this to completion). `fetch_tile` is the comparatively cheap per-tile pull
/// against an already-built mosaic's URL template.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
	/// Asks the rendering backend to materialise the mosaic named by `key`, returning
	/// the URL template tiles can subsequently be fetched from.
	async fn build_mosaic(&self, key: &MosaicKey) -> Result<UpstreamOutcome, UpstreamError>;

	/// Fetches the single tile named by `key` against an already-built mosaic.
	async fn fetch_tile(&self, key: &TileKey, url_template: &str) -> Result<Blob, UpstreamError>;
}

/// `reqwest`-based reference implementation: `url_template` is a format string with
/// `{z}`, `{x}`, `{y}` placeholders, following the same tile-URL convention the teacher
/// uses for its raster data sources.
pub struct HttpUpstreamClient {
	client: reqwest::Client,
	mosaic_endpoint: String,
}

impl HttpUpstreamClient {
	/// # Errors
	/// Returns an error if the underlying `reqwest::Client` cannot be built (e.g. the
	/// platform's TLS backend fails to initialise).
	pub fn new(mosaic_endpoint: impl Into<String>, request_timeout: Duration) -> anyhow::Result<Self> {
		let client = reqwest::Client::builder().timeout(request_timeout).build()?;
		Ok(Self {
			client,
			mosaic_endpoint: mosaic_endpoint.into(),
		})
	}

	fn classify_status(status: reqwest::StatusCode, body: String) -> UpstreamError {
		if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
			UpstreamError::Quota(body)
		} else if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
			UpstreamError::Transient(format!("{status}: {body}"))
		} else {
			UpstreamError::Permanent(format!("{status}: {body}"))
		}
	}
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
	async fn build_mosaic(&self, key: &MosaicKey) -> Result<UpstreamOutcome, UpstreamError> {
		let response = self
			.client
			.get(&self.mosaic_endpoint)
			.query(&[("mosaic", key.canonical())])
			.send()
			.await
			.map_err(|err| UpstreamError::Transient(err.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Self::classify_status(status, body));
		}

		let url_template = response.text().await.map_err(|err| UpstreamError::Transient(err.to_string()))?;
		Ok(UpstreamOutcome { url_template })
	}

	async fn fetch_tile(&self, key: &TileKey, url_template: &str) -> Result<Blob, UpstreamError> {
		let url = url_template
			.replace("{z}", &key.z.to_string())
			.replace("{x}", &key.x.to_string())
			.replace("{y}", &key.y.to_string());

		let response = self.client.get(&url).send().await.map_err(|err| UpstreamError::Transient(err.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Self::classify_status(status, body));
		}

		let bytes = response.bytes().await.map_err(|err| UpstreamError::Transient(err.to_string()))?;
		Ok(Blob::from(bytes.to_vec()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn transient_and_permanent_are_faults_quota_is_not() {
		assert!(UpstreamError::Transient("x".into()).is_fault());
		assert!(UpstreamError::Permanent("x".into()).is_fault());
		assert!(!UpstreamError::Quota("x".into()).is_fault());
	}

	#[test]
	fn classify_status_maps_429_to_quota() {
		let err = HttpUpstreamClient::classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down".into());
		assert!(matches!(err, UpstreamError::Quota(_)));
	}

	#[test]
	fn classify_status_maps_5xx_to_transient() {
		let err = HttpUpstreamClient::classify_status(reqwest::StatusCode::BAD_GATEWAY, "oops".into());
		assert!(matches!(err, UpstreamError::Transient(_)));
	}

	#[test]
	fn classify_status_maps_other_4xx_to_permanent() {
		let err = HttpUpstreamClient::classify_status(reqwest::StatusCode::NOT_FOUND, "gone".into());
		assert!(matches!(err, UpstreamError::Permanent(_)));
	}
}
