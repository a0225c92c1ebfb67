//! Sink for query results.

use crate::error::Result;
use crate::query::value::TypedValue;

/// Execution statistics reported after the last row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub row_count: usize,
    pub elapsed_micros: u64,
}

/// Consumer of a query's output: one header, any number of rows, one
/// summary. Encoding to a wire format is the protocol layer's concern.
pub trait ResultStream {
    fn write_header(&mut self, columns: &[String]) -> Result<()>;
    fn write_row(&mut self, row: Vec<TypedValue>) -> Result<()>;
    fn summary(&mut self, summary: StreamSummary) -> Result<()>;
}

/// In-memory stream that retains everything; used by embedding callers
/// and throughout the test suite.
#[derive(Debug, Default)]
pub struct StreamCollector {
    header: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
    summary: Option<StreamSummary>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<TypedValue>> {
        self.rows
    }

    pub fn stream_summary(&self) -> Option<StreamSummary> {
        self.summary
    }
}

impl ResultStream for StreamCollector {
    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        self.header = columns.to_vec();
        Ok(())
    }

    fn write_row(&mut self, row: Vec<TypedValue>) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }

    fn summary(&mut self, summary: StreamSummary) -> Result<()> {
        self.summary = Some(summary);
        Ok(())
    }
}
