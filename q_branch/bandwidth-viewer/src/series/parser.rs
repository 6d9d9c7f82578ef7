//! Log text to [`TimeSeriesCollection`].
//!
//! Each line is `timestamp,bytes,bytes,...,` where the logger always ends a
//! row with a delimiter. Lines with a single cell (blank lines, a lone
//! `\r`) are skipped without touching the rate baseline.
//!
//! The parse is a fold: [`RateState`] carries the previous timestamp (and,
//! for cumulative counters, the previous counter values) from one valid row
//! to the next. Nothing outlives a call, so parsing the same text with the
//! same config always yields the same collection.

use super::timestamp::{leading_int, to_unix_seconds};
use super::{
    CounterMode, MalformedRowPolicy, ParserConfig, RowError, RowErrorKind, TimeSeriesCollection,
};
use crate::error::{PipelineError, Result};

/// Routers report byte counters as u32 and roll over to zero past this.
const COUNTER_WRAP: i64 = u32::MAX as i64;

/// A split log line: one timestamp cell and zero or more counter cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow<'a> {
    pub timestamp: &'a str,
    pub counters: Vec<&'a str>,
}

impl<'a> RawRow<'a> {
    /// Split a line on commas. `None` for lines with one cell or fewer.
    /// A final empty fragment (trailing delimiter) is not a data cell.
    pub fn split(line: &'a str) -> Option<Self> {
        let mut cells: Vec<&str> = line.split(',').collect();
        if cells.len() <= 1 {
            return None;
        }
        if cells.last().is_some_and(|c| c.trim().is_empty()) {
            cells.pop();
        }
        let timestamp = cells[0];
        cells.remove(0);
        Some(Self {
            timestamp,
            counters: cells,
        })
    }
}

/// Running state threaded between valid rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateState {
    /// Unix seconds of the last row with a readable timestamp; 0 before any.
    pub previous_timestamp: f64,
    /// Whether `previous_timestamp` comes from a real row.
    pub has_baseline: bool,
    /// Last counter value per data column (cumulative mode only).
    pub previous_counters: Vec<Option<i64>>,
}

/// Outcome of folding one row into the state.
#[derive(Debug, Clone)]
pub struct RowStep {
    pub next: RateState,
    /// Timestamp followed by one rate per counter cell.
    pub values: Vec<f64>,
    pub errors: Vec<RowError>,
}

impl RateState {
    /// Compute the row's timestamp and rates against this state and return
    /// the state the following row should see. `self` is left untouched so
    /// callers can discard the step.
    pub fn advance(&self, line: usize, row: &RawRow<'_>, config: &ParserConfig) -> RowStep {
        let mut next = self.clone();
        let mut errors = Vec::new();
        let mut values = Vec::with_capacity(row.counters.len() + 1);

        let unixtime = to_unix_seconds(row.timestamp, config);
        if unixtime.is_none() {
            errors.push(RowError {
                line,
                column: 0,
                kind: RowErrorKind::Timestamp,
            });
        }
        let unixtime = unixtime.unwrap_or(f64::NAN);
        values.push(unixtime);

        let time_delta = unixtime - self.previous_timestamp;
        let suppress = config.skip_first_row_rate && !self.has_baseline;

        for (i, cell) in row.counters.iter().enumerate() {
            let column = i + 1;
            let Some(count) = leading_int(cell) else {
                errors.push(RowError {
                    line,
                    column,
                    kind: RowErrorKind::Counter,
                });
                values.push(f64::NAN);
                continue;
            };

            let bytes = match config.counter_mode {
                CounterMode::Interval => count,
                CounterMode::Cumulative => next.swap_counter(i, count),
            };

            values.push(if suppress {
                f64::NAN
            } else {
                bytes as f64 / time_delta / 1000.0
            });
        }

        if !unixtime.is_nan() {
            next.previous_timestamp = unixtime;
            next.has_baseline = true;
        }

        RowStep {
            next,
            values,
            errors,
        }
    }

    /// Store `current` for column `i` and return the bytes moved since the
    /// previous value. A decrease means the counter wrapped.
    fn swap_counter(&mut self, i: usize, current: i64) -> i64 {
        if self.previous_counters.len() <= i {
            self.previous_counters.resize(i + 1, None);
        }
        let previous = self.previous_counters[i].replace(current);
        match previous {
            Some(prev) if current < prev => COUNTER_WRAP - prev + current,
            Some(prev) => current - prev,
            None => current,
        }
    }
}

/// Parse the full log text.
///
/// Fails only when `config.on_malformed` is [`MalformedRowPolicy::Reject`]
/// and some row has an unreadable cell.
pub fn parse_series(text: &str, config: &ParserConfig) -> Result<TimeSeriesCollection> {
    let (_, collection) = text.split('\n').enumerate().try_fold(
        (RateState::default(), TimeSeriesCollection::default()),
        |(state, mut collection), (idx, line)| {
            let Some(row) = RawRow::split(line) else {
                return Ok((state, collection));
            };
            let step = state.advance(idx + 1, &row, config);

            if step.errors.is_empty() {
                collection.push_row(&step.values);
                return Ok((step.next, collection));
            }

            for err in &step.errors {
                tracing::debug!(
                    line = err.line,
                    column = err.column,
                    kind = ?err.kind,
                    "Malformed row"
                );
            }

            match config.on_malformed {
                MalformedRowPolicy::Mark => {
                    collection.push_row(&step.values);
                    collection.record_errors(step.errors);
                    Ok((step.next, collection))
                }
                MalformedRowPolicy::Skip => {
                    collection.record_errors(step.errors);
                    Ok((state, collection))
                }
                MalformedRowPolicy::Reject => {
                    let first = &step.errors[0];
                    Err(PipelineError::MalformedRow {
                        line: first.line,
                        column: first.column,
                        reason: first.to_string(),
                    })
                }
            }
        },
    )?;

    if !collection.row_errors().is_empty() {
        tracing::warn!(
            rows = collection.len(),
            malformed = collection.row_errors().len(),
            policy = ?config.on_malformed,
            "Series contained malformed cells"
        );
    }

    Ok(collection)
}
