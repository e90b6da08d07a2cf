//! The mosaic build/coalescing state machine (spec §4.6): `absent -> BUILDING ->
//! {READY, FAILED}`, shared across every process serving the fleet via [`crate::MetaStore`]
//! and, within one process, via [`crate::SingleFlight`].

use crate::meta_store::MetaStore;
use crate::single_flight::SingleFlight;
use crate::upstream_client::{UpstreamClient, UpstreamError};
use std::sync::Arc;
use std::time::Duration;
use tilefarm_core::json::JsonObject;
use tilefarm_core::{CoreError, MosaicKey};

/// Where a mosaic build currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicState {
	Building,
	Ready,
	Failed,
}

impl MosaicState {
	fn as_str(self) -> &'static str {
		match self {
			MosaicState::Building => "building",
			MosaicState::Ready => "ready",
			MosaicState::Failed => "failed",
		}
	}

	fn parse(s: &str) -> Option<Self> {
		match s {
			"building" => Some(MosaicState::Building),
			"ready" => Some(MosaicState::Ready),
			"failed" => Some(MosaicState::Failed),
			_ => None,
		}
	}
}

/// The record stored under a mosaic's `metastore_key`.
#[derive(Debug, Clone)]
pub struct MosaicHandle {
	pub state: MosaicState,
	pub url_template: Option<String>,
	pub error: Option<String>,
}

impl MosaicHandle {
	fn building() -> Self {
		Self {
			state: MosaicState::Building,
			url_template: None,
			error: None,
		}
	}

	fn ready(url_template: String) -> Self {
		Self {
			state: MosaicState::Ready,
			url_template: Some(url_template),
			error: None,
		}
	}

	fn failed(error: String) -> Self {
		Self {
			state: MosaicState::Failed,
			url_template: None,
			error: Some(error),
		}
	}

	fn to_bytes(&self) -> Vec<u8> {
		let mut obj = JsonObject::new();
		obj.set("state", self.state.as_str());
		obj.set_optional("url_template", &self.url_template);
		obj.set_optional("error", &self.error);
		obj.stringify().into_bytes()
	}

	fn from_bytes(bytes: &[u8]) -> Option<Self> {
		let text = std::str::from_utf8(bytes).ok()?;
		let obj = JsonObject::parse_str(text).ok()?;
		let state = MosaicState::parse(&obj.get_string("state").ok()??)?;
		Some(Self {
			state,
			url_template: obj.get_string("url_template").ok()?,
			error: obj.get_string("error").ok()?,
		})
	}
}


/// Tunable timings driving the state machine (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct MosaicCacheConfig {
	/// How long a winning builder's election marker, and a `Building` handle, remain valid.
	pub election_ttl: Duration,
	/// How long a `Ready` handle is trusted before a fresh build is required (`MOSAIC_TTL_HOURS`).
	pub ready_ttl: Duration,
	/// How long a `Failed` handle blocks new build attempts before another caller may retry.
	pub cooldown_ttl: Duration,
	/// Initial spacing between polls of a `Building` handle.
	pub poll_initial: Duration,
	/// Ceiling the poll backoff doubles up to.
	pub poll_max: Duration,
}

impl Default for MosaicCacheConfig {
	fn default() -> Self {
		Self {
			election_ttl: Duration::from_secs(60),
			ready_ttl: Duration::from_secs(24 * 60 * 60),
			cooldown_ttl: Duration::from_secs(15),
			poll_initial: Duration::from_millis(50),
			poll_max: Duration::from_millis(500),
		}
	}
}

/// Ensures at most one upstream build runs per `MosaicKey` at a time, across the whole
/// fleet, and that every other caller for the same key waits on that build's outcome
/// rather than starting its own.
pub struct MosaicCache {
	meta: Arc<dyn MetaStore>,
	upstream: Arc<dyn UpstreamClient>,
	flight: SingleFlight<String, Result<String, CoreError>>,
	config: MosaicCacheConfig,
}

impl MosaicCache {
	#[must_use]
	pub fn new(meta: Arc<dyn MetaStore>, upstream: Arc<dyn UpstreamClient>, config: MosaicCacheConfig) -> Self {
		Self {
			meta,
			upstream,
			flight: SingleFlight::new(),
			config,
		}
	}

	/// Returns the URL template for `key`'s mosaic, building it if necessary.
	///
	/// Joins an in-process [`SingleFlight`] so concurrent requests for the same key on
	/// this process share one poll loop; the poll loop itself coalesces across processes
	/// via `MetaStore::setnx`.
	pub async fn get_or_build(&self, key: &MosaicKey) -> Result<String, CoreError> {
		let canonical = key.canonical();
		self.flight.run(canonical, || self.drive(key.clone())).await
	}

	async fn drive(&self, key: MosaicKey) -> Result<String, CoreError> {
		let metastore_key = key.metastore_key();

		if let Some(bytes) = self.meta.get(&metastore_key).await {
			if let Some(handle) = MosaicHandle::from_bytes(&bytes) {
				match handle.state {
					MosaicState::Ready => return Ok(handle.url_template.expect("ready handle always carries a url_template")),
					MosaicState::Building => return self.poll_until_settled(&metastore_key).await,
					MosaicState::Failed => {
						// Cool-down still active: surface the failure without retrying.
						return Err(CoreError::UpstreamPermanent {
							reason: handle.error.unwrap_or_else(|| "mosaic build failed".into()),
						});
					}
				}
			}
		}

		let coalesce_key = key.coalesce_key();
		let won_election = self.meta.setnx(&coalesce_key, b"1".to_vec(), self.config.election_ttl).await;

		if !won_election {
			return self.poll_until_settled(&metastore_key).await;
		}

		self.meta.set(&metastore_key, MosaicHandle::building().to_bytes(), self.config.election_ttl).await;

		match self.upstream.build_mosaic(&key).await {
			Ok(outcome) => {
				self
					.meta
					.set(&metastore_key, MosaicHandle::ready(outcome.url_template.clone()).to_bytes(), self.config.ready_ttl)
					.await;
				Ok(outcome.url_template)
			}
			Err(err) => {
				let reason = err.to_string();
				self.meta.set(&metastore_key, MosaicHandle::failed(reason.clone()).to_bytes(), self.config.cooldown_ttl).await;
				Err(match err {
					UpstreamError::Transient(_) => CoreError::UpstreamTransient,
					UpstreamError::Permanent(_) | UpstreamError::Quota(_) => CoreError::UpstreamPermanent { reason },
				})
			}
		}
	}

	/// Polls the handle at `metastore_key` with exponential backoff until it leaves the
	/// `Building` state or the election TTL elapses, at which point the election is
	/// presumed dead and this caller reports a transient failure rather than hanging.
	async fn poll_until_settled(&self, metastore_key: &str) -> Result<String, CoreError> {
		let mut wait = self.config.poll_initial;
		let deadline = tokio::time::Instant::now() + self.config.election_ttl;

		loop {
			if let Some(bytes) = self.meta.get(metastore_key).await {
				if let Some(handle) = MosaicHandle::from_bytes(&bytes) {
					match handle.state {
						MosaicState::Ready => return Ok(handle.url_template.expect("ready handle always carries a url_template")),
						MosaicState::Failed => {
							return Err(CoreError::UpstreamPermanent {
								reason: handle.error.unwrap_or_else(|| "mosaic build failed".into()),
							});
						}
						MosaicState::Building => {}
					}
				}
			}

			if tokio::time::Instant::now() >= deadline {
				return Err(CoreError::UpstreamTransient);
			}

			tokio::time::sleep(wait).await;
			wait = (wait * 2).min(self.config.poll_max);
		}
	}
}
