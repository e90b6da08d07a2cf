//! Progress indicators for long-running background jobs (cache warming campaigns).
//!
//! Behind the `full` feature this renders a terminal bar; otherwise (e.g. under `test`,
//! or when running headless as a server) it falls back to a no-op drain so job code
//! never has to care which one it's talking to.

#[cfg(all(feature = "full", not(test)))]
mod progress_bar;

#[cfg(any(not(feature = "full"), test))]
mod progress_drain;

mod traits;
pub use traits::{ProgressTrait, get_progress_bar};
