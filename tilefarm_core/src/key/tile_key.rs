//! `TileKey` — the unit of identity for a single rendered tile.

use crate::MosaicKey;
use std::fmt;

/// `MosaicKey` ⊕ `(z, x, y)`. Used both as the MetaStore lookup key and, via
/// [`TileKey::blob_path`], as the BlobStore object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
	pub mosaic: MosaicKey,
	pub z: u8,
	pub x: u32,
	pub y: u32,
}

impl TileKey {
	/// The canonical string form: the mosaic's canonical form plus `|z|x|y`.
	#[must_use]
	pub fn canonical(&self) -> String {
		format!("{}|{}|{}|{}", self.mosaic, self.z, self.x, self.y)
	}

	/// Object path layout: `tiles/<layer>/<period>/<year>[/<month>]/<visparam>/<z>/<x>/<y>.png`.
	#[must_use]
	pub fn blob_path(&self) -> String {
		match self.mosaic.month {
			Some(month) => format!(
				"tiles/{}/{}/{}/{month:02}/{}/{}/{}/{}.png",
				self.mosaic.layer, self.mosaic.period, self.mosaic.year, self.mosaic.visparam, self.z, self.x, self.y
			),
			None => format!(
				"tiles/{}/{}/{}/{}/{}/{}/{}.png",
				self.mosaic.layer, self.mosaic.period, self.mosaic.year, self.mosaic.visparam, self.z, self.x, self.y
			),
		}
	}

	/// A strong ETag derived from the canonical form, stable for the lifetime of the tile
	/// (a visparam-recipe change produces a different `MosaicKey` and thus a different tag).
	#[must_use]
	pub fn etag(&self) -> String {
		use std::collections::hash_map::DefaultHasher;
		use std::hash::{Hash, Hasher};
		let mut hasher = DefaultHasher::new();
		self.hash(&mut hasher);
		format!("\"{:016x}\"", hasher.finish())
	}
}

impl fmt::Display for TileKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Layer, Period};

	fn key() -> TileKey {
		TileKey {
			mosaic: MosaicKey {
				layer: Layer::S2Harmonized,
				period: Period::Wet,
				year: 2023,
				month: None,
				visparam: "tvi-red".into(),
			},
			z: 12,
			x: 100,
			y: 100,
		}
	}

	#[test]
	fn blob_path_matches_the_object_store_layout() {
		assert_eq!(key().blob_path(), "tiles/s2_harmonized/WET/2023/tvi-red/12/100/100.png");
	}

	#[test]
	fn blob_path_with_month_inserts_a_segment() {
		let mut k = key();
		k.mosaic.period = Period::Month;
		k.mosaic.month = Some(7);
		assert_eq!(k.blob_path(), "tiles/s2_harmonized/MONTH/2023/07/tvi-red/12/100/100.png");
	}

	#[test]
	fn etag_is_stable_and_deterministic() {
		assert_eq!(key().etag(), key().etag());
	}
}
