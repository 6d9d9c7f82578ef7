//! Rate series derived from the bandwidth log.
//!
//! # Architecture
//!
//! - `timestamp` - Fixed-width timestamp slicing and Unix conversion
//! - `parser` - Row splitting and the rate fold over log lines
//! - `header` - Column labels from the companion header file
//!
//! The output is a [`TimeSeriesCollection`]: column 0 holds Unix seconds and
//! every further column holds kilobytes per second, all aligned by row.

pub mod header;
pub mod parser;
pub mod timestamp;

pub use parser::{parse_series, RateState};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How counter cells are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CounterMode {
    /// Each cell holds the bytes moved since the previous row.
    #[default]
    Interval,
    /// Each cell holds a running 32-bit byte counter.
    Cumulative,
}

/// What to do with a row whose timestamp or counter cells do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Keep the row with NaN in the affected cells.
    #[default]
    Mark,
    /// Drop the row; it does not move the rate baseline.
    Skip,
    /// Abort the parse with [`PipelineError::MalformedRow`](crate::PipelineError::MalformedRow).
    Reject,
}

/// Parser options. Defaults reproduce the legacy chart behaviour, except that
/// months are read as calendar months (see `legacy_month_offset`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Read timestamps as UTC instead of process-local time.
    pub assume_utc: bool,
    /// Read the month field as 0-based, dating every row one month later the
    /// way the old browser chart did.
    pub legacy_month_offset: bool,
    /// Emit NaN rates for the first row instead of dividing by the time
    /// elapsed since the Unix epoch.
    pub skip_first_row_rate: bool,
    pub counter_mode: CounterMode,
    pub on_malformed: MalformedRowPolicy,
}

/// Which cell of a row failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowErrorKind {
    Timestamp,
    Counter,
}

/// A per-row parse problem. Never fatal unless the policy is `Reject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line number in the series text.
    pub line: usize,
    /// Column index; 0 is the timestamp.
    pub column: usize,
    pub kind: RowErrorKind,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RowErrorKind::Timestamp => {
                write!(f, "line {}: unparseable timestamp", self.line)
            }
            RowErrorKind::Counter => write!(
                f,
                "line {}: non-numeric byte count in column {}",
                self.line, self.column
            ),
        }
    }
}

/// Timestamp column plus one rate column per counter, all of equal length.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesCollection {
    columns: Vec<Vec<f64>>,
    labels: Vec<String>,
    row_errors: Vec<RowError>,
}

impl Default for TimeSeriesCollection {
    fn default() -> Self {
        Self {
            columns: vec![Vec::new()],
            labels: Vec::new(),
            row_errors: Vec::new(),
        }
    }
}

impl TimeSeriesCollection {
    /// Number of rows (entries per column).
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All columns, timestamps first.
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Unix seconds per row.
    pub fn timestamps(&self) -> &[f64] {
        &self.columns[0]
    }

    /// Rate column `column` (1-based, matching the CSV cell index).
    pub fn rates(&self, column: usize) -> Option<&[f64]> {
        if column == 0 {
            return None;
        }
        self.columns.get(column).map(Vec::as_slice)
    }

    /// Number of rate columns.
    pub fn data_columns(&self) -> usize {
        self.columns.len() - 1
    }

    /// One label per rate column.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_errors(&self) -> &[RowError] {
        &self.row_errors
    }

    /// Replace generic labels with the given names, in column order. Extra
    /// names are ignored; columns without a name keep their generic label.
    pub fn apply_labels(&mut self, names: &[String]) {
        for (label, name) in self.labels.iter_mut().zip(names) {
            label.clone_from(name);
        }
    }

    pub fn into_columns(self) -> Vec<Vec<f64>> {
        self.columns
    }

    /// Append one row. A row wider than the collection adds columns that
    /// are NaN for every earlier row; a narrower row is padded with NaN.
    pub(crate) fn push_row(&mut self, values: &[f64]) {
        let rows = self.len();
        while self.columns.len() < values.len() {
            self.columns.push(vec![f64::NAN; rows]);
            self.labels.push(generic_label(self.columns.len() - 1));
        }
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.push(values.get(i).copied().unwrap_or(f64::NAN));
        }
    }

    pub(crate) fn record_errors(&mut self, errors: impl IntoIterator<Item = RowError>) {
        self.row_errors.extend(errors);
    }
}

fn generic_label(column: usize) -> String {
    format!("column {column}")
}
