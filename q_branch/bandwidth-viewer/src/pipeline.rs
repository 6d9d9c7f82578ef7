//! Manifest to rate series, end to end.
//!
//! Stages run strictly in sequence: manifest fetch, entry selection, series
//! fetch, parse, then the optional header fetch for column labels. Every
//! run starts from fresh state, so one `Pipeline` can serve concurrent
//! callers without locking.

use std::time::Instant;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fetch::TextSource;
use crate::location::Location;
use crate::manifest::{self, ResolvedEntry, Selection};
use crate::series::header::parse_header;
use crate::series::{parse_series, TimeSeriesCollection};

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    /// Manifest key of the selected series.
    pub name: String,
    pub data_location: Location,
    pub collection: TimeSeriesCollection,
}

pub struct Pipeline<S> {
    source: S,
    config: PipelineConfig,
}

impl<S: TextSource> Pipeline<S> {
    pub fn new(source: S, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with the configured selection.
    pub async fn run(&self, manifest_location: &Location) -> Result<SeriesReport> {
        self.run_selected(manifest_location, &self.config.selection)
            .await
    }

    /// Run with an explicit selection, ignoring the configured one.
    pub async fn run_selected(
        &self,
        manifest_location: &Location,
        selection: &Selection,
    ) -> Result<SeriesReport> {
        let started = Instant::now();
        let entry = manifest::resolve(&self.source, manifest_location, selection).await?;
        let report = self.run_entry(entry).await?;

        tracing::info!(
            name = %report.name,
            rows = report.collection.len(),
            columns = report.collection.data_columns(),
            malformed = report.collection.row_errors().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built rate series"
        );
        Ok(report)
    }

    /// Fetch and parse an already resolved entry.
    pub async fn run_entry(&self, entry: ResolvedEntry) -> Result<SeriesReport> {
        let text = self.source.fetch_text(&entry.data).await?;
        let mut collection = parse_series(&text, &self.config.parser)?;

        if let Some(header) = &entry.header {
            match self.source.fetch_text(header).await {
                Ok(text) => collection.apply_labels(&parse_header(&text)),
                Err(e) => tracing::warn!(
                    header = %header,
                    error = %e,
                    "Header unavailable, using generic column labels"
                ),
            }
        }

        Ok(SeriesReport {
            name: entry.name,
            data_location: entry.data,
            collection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fetch::tests::MemorySource;
    use crate::series::{MalformedRowPolicy, ParserConfig};

    const MANIFEST: &str = "/logs/manifest.json";

    fn utc_config() -> PipelineConfig {
        PipelineConfig {
            parser: ParserConfig {
                assume_utc: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn source() -> MemorySource {
        MemorySource::default()
            .with(
                MANIFEST,
                r#"{
  "2024-01-01 000000": {"header": "2024-01-01 000000 header.csv", "data": "2024-01-01 000000.csv"},
  "2024-01-02 000000": {"data": "2024-01-02 000000.csv"}
}"#,
            )
            .with(
                "/logs/2024-01-01 000000 header.csv",
                ",aa:aa:aa:aa:aa:aa,bb:bb:bb:bb:bb:bb,\n",
            )
            .with(
                "/logs/2024-01-01 000000.csv",
                "2024-01-01 000000,0,0,\n2024-01-01 000005,5000,10000,\n",
            )
            .with(
                "/logs/2024-01-02 000000.csv",
                "2024-01-02 000000,0,\n2024-01-02 000002,bad,\n",
            )
    }

    #[tokio::test]
    async fn test_run_first_entry_with_labels() {
        let pipeline = Pipeline::new(source(), utc_config());
        let report = pipeline
            .run(&Location::parse(MANIFEST).unwrap())
            .await
            .unwrap();

        assert_eq!(report.name, "2024-01-01 000000");
        assert_eq!(report.data_location.to_string(), "/logs/2024-01-01 000000.csv");
        let c = &report.collection;
        assert_eq!(c.len(), 2);
        assert_eq!(c.labels(), &["aa:aa:aa:aa:aa:aa", "bb:bb:bb:bb:bb:bb"]);
        assert_eq!(c.rates(1).unwrap()[1], 1.0);
        assert_eq!(c.rates(2).unwrap()[1], 2.0);
    }

    #[tokio::test]
    async fn test_run_selected_without_header() {
        let pipeline = Pipeline::new(source(), utc_config());
        let report = pipeline
            .run_selected(&Location::parse(MANIFEST).unwrap(), &Selection::Last)
            .await
            .unwrap();

        assert_eq!(report.name, "2024-01-02 000000");
        assert_eq!(report.collection.labels(), &["column 1"]);
        assert_eq!(report.collection.row_errors().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_header_falls_back_to_generic_labels() {
        let mut src = source();
        src.files.remove("/logs/2024-01-01 000000 header.csv");
        let pipeline = Pipeline::new(src, utc_config());
        let report = pipeline
            .run(&Location::parse(MANIFEST).unwrap())
            .await
            .unwrap();
        assert_eq!(report.collection.labels(), &["column 1", "column 2"]);
    }

    #[tokio::test]
    async fn test_missing_series_is_unavailable() {
        let mut src = source();
        src.files.remove("/logs/2024-01-01 000000.csv");
        let pipeline = Pipeline::new(src, utc_config());
        let err = pipeline
            .run(&Location::parse(MANIFEST).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_reject_policy_propagates() {
        let mut config = utc_config();
        config.parser.on_malformed = MalformedRowPolicy::Reject;
        config.selection = Selection::Last;
        let pipeline = Pipeline::new(source(), config);
        let err = pipeline
            .run(&Location::parse(MANIFEST).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow { line: 2, column: 1, .. }));
    }

    #[tokio::test]
    async fn test_runs_are_independent() {
        let pipeline = Pipeline::new(source(), utc_config());
        let location = Location::parse(MANIFEST).unwrap();
        let (a, b) = tokio::join!(pipeline.run(&location), pipeline.run(&location));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.collection.timestamps(), b.collection.timestamps());
        assert_eq!(a.collection.rates(1), b.collection.rates(1));
    }
}
