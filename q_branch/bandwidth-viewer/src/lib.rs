//! Per-device bandwidth log ingestion and rate series viewer.
//!
//! A router poller writes one CSV row per polling interval: a fixed-width
//! local timestamp followed by the bytes each hardware address moved during
//! that interval. This crate turns those logs into chartable rate series.
//!
//! ## Architecture
//!
//! 1. **Manifest Resolver** (`manifest` module) - Reads the JSON index of
//!    log files and picks one series by an explicit [`Selection`].
//!
//! 2. **Rate Series Parser** (`series` module) - Folds log lines into a
//!    [`TimeSeriesCollection`]: Unix seconds plus kB/s per device.
//!
//! 3. **Viewer** (`viewer` module) - axum server that generates the manifest
//!    from a logs directory and serves files, series JSON and a chart page.
//!
//! [`Pipeline`] ties the first two together over any [`TextSource`].
//!
//! ## Usage
//!
//! ```bash
//! bandwidth-viewer serve --logs-dir ./logs --port 8050
//! bandwidth-viewer series http://127.0.0.1:8050/logs/manifest.json --assume-utc
//! bandwidth-viewer manifest ./logs
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod location;
pub mod manifest;
pub mod pipeline;
pub mod series;
pub mod viewer;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use fetch::{Fetcher, TextSource};
pub use location::Location;
pub use manifest::{Manifest, ManifestEntry, ResolvedEntry, Selection};
pub use pipeline::{Pipeline, SeriesReport};
pub use series::{
    CounterMode, MalformedRowPolicy, ParserConfig, RowError, RowErrorKind, TimeSeriesCollection,
};
