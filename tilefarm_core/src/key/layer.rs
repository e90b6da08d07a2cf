//! The satellite-imagery layers the core knows how to serve.

use crate::CoreError;
use std::fmt;
use std::str::FromStr;

/// A served imagery layer. Each layer has its own valid year range and visparam category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
	S2Harmonized,
	Landsat,
}

impl Layer {
	/// The canonical lowercase identifier, as used in keys, paths, and the wire API.
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Layer::S2Harmonized => "s2_harmonized",
			Layer::Landsat => "landsat",
		}
	}

	/// The oldest year this layer has mosaics for.
	#[must_use]
	pub fn min_year(&self) -> u16 {
		match self {
			Layer::S2Harmonized => 2017,
			Layer::Landsat => 1985,
		}
	}

	/// The visparam category compatible with this layer (see [`crate::VisParam`]).
	#[must_use]
	pub fn visparam_category(&self) -> &'static str {
		match self {
			Layer::S2Harmonized => "sentinel",
			Layer::Landsat => "landsat",
		}
	}

	/// All layers the core currently knows how to serve.
	#[must_use]
	pub fn all() -> &'static [Layer] {
		&[Layer::S2Harmonized, Layer::Landsat]
	}
}

impl fmt::Display for Layer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Layer {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"s2_harmonized" => Ok(Layer::S2Harmonized),
			"landsat" => Ok(Layer::Landsat),
			other => Err(CoreError::NotFound(format!("unknown layer '{other}'"))),
		}
	}
}
