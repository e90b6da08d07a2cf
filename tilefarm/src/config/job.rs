//! Cache-warming job pool configuration for the Tile Farm server.
//!
//! This module defines the [`JobConfig`] struct, which sizes the `JobEngine`'s
//! worker pool (spec `JOB_POOL_SIZE`) and the per-priority-queue backlog before
//! `enqueue` starts returning `QueueFull`.
//!
//! # Example YAML
//! ```yaml
//! job:
//!   worker_count: 8
//!   queue_capacity: 1000
//! ```
//!
//! All fields are optional. Defaults are applied when values are not specified.

use serde::Deserialize;
use tilefarm_derive::ConfigDoc;

/// Configuration for the asynchronous cache-warming job engine (spec §4.10).
///
/// * `worker_count` — Fixed pool of worker fibers consuming the priority queues.
/// * `queue_capacity` — Per-queue backlog bound before `enqueue` returns `QueueFull`.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, ConfigDoc)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
	/// Optional number of worker fibers draining the priority queues
	/// Defaults to 8
	#[serde()]
	#[config_demo("8")]
	pub worker_count: Option<usize>,

	/// Optional per-queue backlog bound
	/// Defaults to 1000
	#[serde()]
	#[config_demo("1000")]
	pub queue_capacity: Option<usize>,
}

/// Helper methods for merging partial `JobConfig` values.
impl JobConfig {
	pub fn override_optional_worker_count(&mut self, worker_count: &Option<usize>) {
		if worker_count.is_some() {
			self.worker_count = *worker_count;
		}
	}
	pub fn override_optional_queue_capacity(&mut self, queue_capacity: &Option<usize>) {
		if queue_capacity.is_some() {
			self.queue_capacity = *queue_capacity;
		}
	}
}
