//! Pure, stateless request validation and cache-key/path derivation.
//!
//! [`KeySpace`] holds no state: every operation is a pure function of its arguments, so it
//! needs no lifecycle and can be called freely from any task without synchronisation.

mod layer;
mod mosaic_key;
mod period;
mod request;
mod tile_key;

pub use layer::Layer;
pub use mosaic_key::MosaicKey;
pub use period::Period;
pub use request::TileRequest;
pub use tile_key::TileKey;

use crate::{CoreError, VisParamRegistry};

/// Namespace for the KeySpace operations of spec §4.1. Holds no state.
pub struct KeySpace;

impl KeySpace {
	/// Validates every field of `req` (range, enum, layer/visparam compatibility,
	/// month-iff-`MONTH`) and returns the canonical [`TileKey`].
	///
	/// # Errors
	/// `BadRequest` on a malformed field; `NotFound` if the layer/year/visparam combination
	/// does not exist.
	pub fn canonicalise(req: &TileRequest, registry: &dyn VisParamRegistry) -> Result<TileKey, CoreError> {
		if !(6..=18).contains(&req.z) {
			return Err(CoreError::BadRequest(format!("z ({}) must be in 6..=18", req.z)));
		}
		let max = 1u32 << req.z;
		if req.x >= max {
			return Err(CoreError::BadRequest(format!("x ({}) out of bounds for z {}", req.x, req.z)));
		}
		if req.y >= max {
			return Err(CoreError::BadRequest(format!("y ({}) out of bounds for z {}", req.y, req.z)));
		}

		match (req.period.requires_month(), req.month) {
			(true, None) => return Err(CoreError::BadRequest("period MONTH requires a month".into())),
			(false, Some(_)) => return Err(CoreError::BadRequest("month is only valid for period MONTH".into())),
			(true, Some(month)) if !(1..=12).contains(&month) => {
				return Err(CoreError::BadRequest(format!("month ({month}) must be in 1..=12")));
			}
			_ => {}
		}

		if req.year < req.layer.min_year() {
			return Err(CoreError::NotFound(format!(
				"year {} predates {} (min {})",
				req.year,
				req.layer,
				req.layer.min_year()
			)));
		}

		if !registry.is_compatible(req.layer, &req.visparam) {
			return Err(CoreError::NotFound(format!(
				"visparam '{}' unknown or incompatible with layer '{}'",
				req.visparam, req.layer
			)));
		}

		Ok(TileKey {
			mosaic: MosaicKey {
				layer: req.layer,
				period: req.period,
				year: req.year,
				month: req.month,
				visparam: req.visparam.clone(),
			},
			z: req.z,
			x: req.x,
			y: req.y,
		})
	}

	/// The `MosaicKey` a `TileKey` was built against.
	#[must_use]
	pub fn mosaic_of(key: &TileKey) -> MosaicKey {
		key.mosaic.clone()
	}

	/// `BlobStore` object path for `key`.
	#[must_use]
	pub fn blob_path(key: &TileKey) -> String {
		key.blob_path()
	}

	/// Inverse of [`KeySpace::blob_path`]. Round-trip law:
	/// `blob_path_inv(blob_path(k)) == Some(k)` for every valid `k`.
	#[must_use]
	pub fn blob_path_inv(path: &str) -> Option<TileKey> {
		let rest = path.strip_prefix("tiles/")?;
		let parts: Vec<&str> = rest.split('/').collect();

		let (layer, period, year, month, visparam, z, x, y_png) = match parts.as_slice() {
			[layer, period, year, visparam, z, x, y_png] => (*layer, *period, *year, None, *visparam, *z, *x, *y_png),
			[layer, period, year, month, visparam, z, x, y_png] => {
				(*layer, *period, *year, Some(*month), *visparam, *z, *x, *y_png)
			}
			_ => return None,
		};

		let layer: Layer = layer.parse().ok()?;
		let period: Period = period.parse().ok()?;
		let year: u16 = year.parse().ok()?;
		let month: Option<u8> = month.map(|m| m.parse().ok()).transpose()?;
		let z: u8 = z.parse().ok()?;
		let x: u32 = x.parse().ok()?;
		let y: u32 = y_png.strip_suffix(".png")?.parse().ok()?;

		Some(TileKey {
			mosaic: MosaicKey {
				layer,
				period,
				year,
				month,
				visparam: visparam.to_string(),
			},
			z,
			x,
			y,
		})
	}
}
