//! Pipeline configuration.
//!
//! Defaults reproduce the legacy chart: first manifest key, local-time
//! timestamps, first-row rate against the epoch, NaN for unreadable cells.
//! Months are calendar months unless `legacy_month_offset` asks for the old
//! chart's one-month shift. A YAML file can override any of these; CLI flags override the file.
//!
//! ```yaml
//! selection: last
//! assume_utc: true
//! skip_first_row_rate: true
//! legacy_month_offset: false
//! counter_mode: interval
//! on_malformed: skip
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::manifest::Selection;
use crate::series::ParserConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub selection: Selection,
    #[serde(flatten)]
    pub parser: ParserConfig,
}

impl PipelineConfig {
    /// Read a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "Loaded pipeline config");
        Ok(config)
    }
}
