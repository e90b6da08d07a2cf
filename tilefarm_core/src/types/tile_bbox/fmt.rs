use crate::TileBBox;
use std::fmt;

/// Implements `Debug` for [`TileBBox`].
///
/// The output shows zoom level, inclusive coordinates, and dimensions:
///
/// ```text
/// z: [x_min,y_min,x_max,y_max] (widthxheight)
/// ```
///
/// Example:
/// ```
/// # use tilefarm_core::TileBBox;
/// let bb = TileBBox::from_min_and_size(4, 5, 6, 3, 2).unwrap();
/// assert_eq!(format!("{:?}", bb), "4: [5,6,7,7] (3x2)");
/// ```
impl fmt::Debug for TileBBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}: [{},{},{},{}] ({}x{})",
			self.level,
			self.x_min().map_or(String::from("?"), |v| v.to_string()),
			self.y_min().map_or(String::from("?"), |v| v.to_string()),
			self.x_max().map_or(String::from("?"), |v| v.to_string()),
			self.y_max().map_or(String::from("?"), |v| v.to_string()),
			self.width(),
			self.height()
		)
	}
}

/// Implements `Display` for [`TileBBox`].
///
/// The output includes only zoom level and inclusive coordinates without dimensions:
///
/// ```text
/// z:[x_min,y_min,x_max,y_max]
/// ```
///
/// Example:
/// ```
/// # use tilefarm_core::TileBBox;
/// let bb = TileBBox::from_min_and_size(4, 5, 6, 3, 2).unwrap();
/// assert_eq!(format!("{}", bb), "4:[5,6,7,7]");
/// ```
impl fmt::Display for TileBBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:[{},{},{},{}]",
			self.level,
			self.x_min().map_or(String::from("?"), |v| v.to_string()),
			self.y_min().map_or(String::from("?"), |v| v.to_string()),
			self.x_max().map_or(String::from("?"), |v| v.to_string()),
			self.y_max().map_or(String::from("?"), |v| v.to_string())
		)
	}
}
