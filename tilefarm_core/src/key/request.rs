//! What the core consumes on the hot path, before it has been validated.

use crate::{Layer, Period};

/// A tile request as received at the edge, unvalidated.
///
/// [`crate::KeySpace::canonicalise`] is the only thing that turns this into a [`crate::TileKey`];
/// nothing downstream of that call ever sees a `TileRequest` again.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
	pub layer: Layer,
	pub z: u8,
	pub x: u32,
	pub y: u32,
	pub period: Period,
	pub year: u16,
	/// Present iff `period == Period::Month`.
	pub month: Option<u8>,
	pub visparam: String,
}
