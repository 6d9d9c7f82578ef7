//! Bandwidth viewer HTTP surface.
//!
//! Serves the logs directory the way the chart page expects it: a generated
//! manifest, the raw files, and the derived series as JSON.

pub mod server;

pub use server::{router, run_server, AppState, ServerConfig};
