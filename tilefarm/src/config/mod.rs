//! Tile Farm server configuration system.
//!
//! This module provides the configuration types and parsers for the Tile Farm server.
//! It includes support for:
//! - [`Config`]: top-level configuration loader and YAML parser
//! - [`ServerConfig`]: network and API settings
//! - [`CorsConfig`]: CORS policy configuration
//! - [`CacheConfig`]: BlobStore/LocalCache sizing
//! - [`UpstreamConfig`]: Earth-imagery backend endpoint and timeouts
//! - [`LimiterConfig`]: edge rate limits, upstream concurrency, circuit breaker
//! - [`JobConfig`]: cache-warming worker pool sizing
//! - [`AdminConfig`]: control-plane authentication
//!
//! These submodules are typically deserialized from a YAML file (`server.yml`)
//! and consumed by the HTTP server during startup.

mod admin;
mod cache;
mod cors;
mod job;
mod limiter;
mod main;
mod server;
mod upstream;

pub use admin::AdminConfig;
pub use cache::CacheConfig;
pub use cors::CorsConfig;
pub use job::JobConfig;
pub use limiter::LimiterConfig;
pub use main::Config;
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;
