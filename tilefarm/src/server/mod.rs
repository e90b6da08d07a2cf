//! HTTP server: tile/capabilities handlers, the admin control plane, router
//! composition, CORS, and process lifecycle.

mod admin;
mod cors;
mod handlers;
mod lifecycle;
mod routes;

pub use admin::AdminState;
pub use lifecycle::TileFarmServer;
