//! The key under which an upstream mosaic build is coalesced and cached.

use crate::{Layer, Period};
use std::fmt;

/// `(layer, period, year, month?, visparam)` — two requests with the same `MosaicKey` share
/// one upstream mosaic. Canonical string form is a fixed, sorted, pipe-separated serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MosaicKey {
	pub layer: Layer,
	pub period: Period,
	pub year: u16,
	pub month: Option<u8>,
	pub visparam: String,
}

impl MosaicKey {
	/// The canonical string form, e.g. `s2_harmonized|WET|2023|tvi-red` or, with a month,
	/// `landsat|MONTH|2024|07|landsat-tvi-false`.
	#[must_use]
	pub fn canonical(&self) -> String {
		match self.month {
			Some(month) => format!(
				"{}|{}|{}|{month:02}|{}",
				self.layer, self.period, self.year, self.visparam
			),
			None => format!("{}|{}|{}|{}", self.layer, self.period, self.year, self.visparam),
		}
	}

	/// The MetaStore key this mosaic's [`crate::MosaicHandle`](crate::key::mosaic_key::MosaicKey)
	/// is stored under.
	#[must_use]
	pub fn metastore_key(&self) -> String {
		format!("mosaic:{}", self.canonical())
	}

	/// The MetaStore key the single-flight election marker is stored under.
	#[must_use]
	pub fn coalesce_key(&self) -> String {
		format!("coalesce:{}", self.canonical())
	}
}

impl fmt::Display for MosaicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical())
	}
}
