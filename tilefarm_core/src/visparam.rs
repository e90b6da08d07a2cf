//! Visualization parameters: the render recipes named by a [`crate::TileRequest`].
//!
//! The catalogue itself is externally managed (see spec §1's out-of-scope list); this
//! module only defines the shape of a recipe and the read-only view the core needs over it.

use crate::Layer;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// The sensor family a visparam recipe was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisParamCategory {
	Sentinel,
	Landsat,
}

impl VisParamCategory {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			VisParamCategory::Sentinel => "sentinel",
			VisParamCategory::Landsat => "landsat",
		}
	}
}

/// A read-only render recipe: which bands to pull, how to stretch them, and an optional palette.
#[derive(Debug, Clone, PartialEq)]
pub struct VisParam {
	pub name: String,
	pub category: VisParamCategory,
	pub bands: Vec<String>,
	pub stretch_min: f64,
	pub stretch_max: f64,
	pub palette: Option<String>,
	/// Whether this recipe is currently servable; inactive recipes behave as `NotFound`.
	pub active: bool,
}

impl VisParam {
	/// Whether this recipe may be paired with `layer` (e.g. a `landsat-*` recipe is
	/// rejected on `s2_harmonized`).
	#[must_use]
	pub fn is_compatible(&self, layer: Layer) -> bool {
		self.category.as_str() == layer.visparam_category()
	}
}

/// Read-only view over the externally-managed visparam catalogue.
///
/// A change in [`version`](VisParamRegistry::version) invalidates the derived capabilities
/// snapshot but never mutates tiles already cached under the old recipe — the recipe is
/// captured in the `MosaicKey` at creation time, so a renamed/reparameterised visparam simply
/// produces a different key.
pub trait VisParamRegistry: Send + Sync {
	/// Looks up a recipe by name. `None` covers both "unknown" and "inactive".
	fn lookup(&self, name: &str) -> Option<VisParam>;

	/// Whether `name` is both known and compatible with `layer`.
	fn is_compatible(&self, layer: Layer, name: &str) -> bool {
		self.lookup(name).is_some_and(|vp| vp.active && vp.is_compatible(layer))
	}

	/// Monotonically increasing catalogue version; bump on every external refresh.
	fn version(&self) -> u64;

	/// Every recipe currently in the catalogue, active or not. Used to build the
	/// `/api/capabilities` snapshot; not on the hot path.
	fn all(&self) -> Vec<VisParam>;
}

/// In-process reference registry: an [`ArcSwap`] snapshot refreshed wholesale from the
/// external catalogue, the same lock-free hot-swap pattern the teacher uses for its
/// static-source list.
pub struct StaticVisParamRegistry {
	snapshot: ArcSwap<(u64, HashMap<String, VisParam>)>,
}

impl StaticVisParamRegistry {
	#[must_use]
	pub fn new(entries: Vec<VisParam>) -> Self {
		let map = entries.into_iter().map(|vp| (vp.name.clone(), vp)).collect();
		Self {
			snapshot: ArcSwap::from_pointee((1, map)),
		}
	}

	/// Replaces the whole catalogue and bumps [`VisParamRegistry::version`].
	pub fn replace(&self, entries: Vec<VisParam>) {
		let version = self.snapshot.load().0 + 1;
		let map = entries.into_iter().map(|vp| (vp.name.clone(), vp)).collect();
		self.snapshot.store(Arc::new((version, map)));
	}
}

impl VisParamRegistry for StaticVisParamRegistry {
	fn lookup(&self, name: &str) -> Option<VisParam> {
		self.snapshot.load().1.get(name).cloned()
	}

	fn version(&self) -> u64 {
		self.snapshot.load().0
	}

	fn all(&self) -> Vec<VisParam> {
		self.snapshot.load().1.values().cloned().collect()
	}
}
