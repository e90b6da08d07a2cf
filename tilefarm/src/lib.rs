//! # Tile Farm
//!
//! Tile Farm is a high-throughput XYZ tile server for satellite-imagery mosaics. It sits in
//! front of an expensive per-mosaic rendering backend and serves individually cacheable
//! `{layer}/{x}/{y}/{z}` tiles, coalescing concurrent build requests for the same mosaic and
//! caching rendered tiles both in-process and in a durable object store.
//!
//! ## Crate layout
//! - [`config`]: YAML/env configuration for every component below.
//! - [`engine`]: `TileEngine`, the hot path that turns a `TileRequest` into image bytes.
//! - [`job`]: `JobEngine`, the background cache-warming worker pool.
//! - `server` *(feature `full`)*: the Axum HTTP server, control plane, and CORS.
//!
//! ## Feature flags
//!
//! - **cli** *(default)*: Enables the command-line binary (clap, env_logger).
//! - **full** *(default)*: Enables the HTTP server, admin control plane, and their
//!   dependencies (axum, tower, tower-http, regex).

pub mod config;
pub mod engine;
pub mod job;
#[cfg(feature = "full")]
pub mod server;

pub use tilefarm_cache as cache;
pub use tilefarm_core as core;
pub use tilefarm_derive as derive;
