//! Core types shared across the tile farm: coordinates, bounding boxes, the `Blob` wire
//! type, the tile/mosaic key space, error kinds, visualization parameters, and
//! hand-rolled JSON.

pub mod error;
pub use error::*;
pub mod key;
pub use key::*;
pub mod visparam;
pub use visparam::*;
pub mod json;
pub mod macros;
pub mod progress;
pub mod types;
pub use types::*;
pub mod concurrency;
pub use concurrency::*;
