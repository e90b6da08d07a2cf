//! Contains types like coordinates, bounding boxes (bboxes), and in-process cache helpers.

mod blob;
pub use blob::*;

mod byte_range;
pub use byte_range::*;

mod geo_bbox;
pub use geo_bbox::*;

mod tile_bbox;
pub use tile_bbox::*;

mod tile_coord;
pub use tile_coord::*;
