//! # pfi-server
//!
//! Hosts the five demo PFIs, each on its own port, from one process.
//!
//! ## Startup
//!
//! ```text
//! .env + environment ─▶ ServerConfig
//!                     ─▶ tracing subscriber
//!                     ─▶ sanctions roster load (+ optional refresh task)
//!                     ─▶ keys/<pfi>.json ─▶ signed catalogs ─▶ Pfi ─▶ axum Router
//!                     ─▶ resume interrupted exchanges
//!                     ─▶ serve until SIGINT / SIGTERM
//! ```

pub mod app;
pub mod catalog_data;
pub mod config;
pub mod http;
pub mod keys;
pub mod telemetry;

pub use app::{Hosted, assemble};
pub use config::{LogFormat, ServerConfig};
pub use http::{ApiError, AppState, router};
