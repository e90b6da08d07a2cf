//! JSON utilities for parsing, reading, and stringifying JSON data, including support for
//! NDJSON (newline-delimited JSON). Re-exports `JsonValue`, `JsonArray`, and `JsonObject`.

mod read;
mod stringify;
mod types;

pub use read::{read_ndjson_iter, read_ndjson_stream};
pub use stringify::*;
pub use types::{JsonArray, JsonObject, JsonValue};
