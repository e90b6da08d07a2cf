//! The hybrid cache/coalescing engine: `MetaStore`, `BlobStore`, `LocalCache`,
//! `MosaicCache`, `Limiter`, and the `UpstreamClient` adapter.
//!
//! Everything in this crate is a building block for `tilefarm`'s `TileEngine`; nothing
//! here knows about HTTP. Each component is a trait plus an in-process reference
//! implementation, so tests (and, eventually, a Redis/S3-backed deployment) can swap
//! the backend without touching the pipeline that composes them.

mod blob_store;
mod limiter;
mod local_cache;
mod meta_store;
mod mosaic_cache;
mod single_flight;
mod upstream_client;

pub use blob_store::{BlobStore, FsBlobStore};
pub use limiter::{CircuitState, EdgeDecision, Limiter, LimiterConfig, UpstreamPermit};
pub use local_cache::LocalCache;
pub use meta_store::{BucketDecision, InProcessMetaStore, MetaStore};
pub use mosaic_cache::{MosaicCache, MosaicCacheConfig, MosaicHandle, MosaicState};
pub use single_flight::SingleFlight;
pub use upstream_client::{HttpUpstreamClient, UpstreamClient, UpstreamError, UpstreamOutcome};
