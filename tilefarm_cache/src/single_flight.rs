//! Per-process request coalescing: concurrent callers for the same key share one
//! in-flight future instead of each driving their own work (spec §4.5, §4.6).
//!
//! This is the in-process half of the coalescer; [`crate::MosaicCache`] layers the
//! cross-process election on top of it via `MetaStore::setnx`.

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::hash::Hash;

/// Coalesces concurrent calls keyed by `K`: the first caller for a given key drives
/// `make` to completion; every other caller arriving before it finishes receives a
/// clone of the same running future.
///
/// Modeled on the broker pattern in `broker/src/core/mod.rs`: a `DashMap` of
/// `Shared<BoxFuture<...>>`, with the map entry removed once the future resolves so
/// the next call for that key starts fresh work rather than replaying a stale result.
pub struct SingleFlight<K, V> {
	inflight: DashMap<K, Shared<BoxFuture<'static, V>>>,
}

impl<K, V> Default for SingleFlight<K, V>
where
	K: Eq + Hash + Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<K, V> SingleFlight<K, V>
where
	K: Eq + Hash + Clone + Send + Sync + 'static,
	V: Clone + Send + Sync + 'static,
{
	#[must_use]
	pub fn new() -> Self {
		Self { inflight: DashMap::new() }
	}

	/// Runs `make` for `key`, or joins an already-running call for the same key.
	///
	/// `make` is only invoked when this call is the one that inserts the in-flight
	/// entry; a joiner never evaluates it.
	pub async fn run<F>(&self, key: K, make: impl FnOnce() -> F) -> V
	where
		F: Future<Output = V> + Send + 'static,
	{
		let shared = match self.inflight.entry(key.clone()) {
			dashmap::mapref::entry::Entry::Occupied(slot) => slot.get().clone(),
			dashmap::mapref::entry::Entry::Vacant(slot) => {
				let shared: Shared<BoxFuture<'static, V>> = make().boxed().shared();
				slot.insert(shared.clone());
				shared
			}
		};

		let result = shared.await;
		self.inflight.remove(&key);
		result
	}

	/// Number of keys with a call currently in flight.
	#[must_use]
	pub fn len(&self) -> usize {
		self.inflight.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.inflight.is_empty()
	}
}
