//! The compositing period a mosaic was built over.

use crate::CoreError;
use std::fmt;
use std::str::FromStr;

/// A mosaic compositing period. Canonical string form is the uppercase wire spelling
/// (`WET`/`DRY`/`MONTH`) — unlike [`crate::Layer`] or visparam names, this identifier has
/// no independent casing choice, since the wire query parameter itself is uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
	Wet,
	Dry,
	Month,
}

impl Period {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Period::Wet => "WET",
			Period::Dry => "DRY",
			Period::Month => "MONTH",
		}
	}

	/// Whether this period requires a `month` field to accompany it.
	#[must_use]
	pub fn requires_month(&self) -> bool {
		matches!(self, Period::Month)
	}
}

impl fmt::Display for Period {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Period {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"WET" => Ok(Period::Wet),
			"DRY" => Ok(Period::Dry),
			"MONTH" => Ok(Period::Month),
			other => Err(CoreError::BadRequest(format!("invalid period '{other}'"))),
		}
	}
}
