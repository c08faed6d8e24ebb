//! Series accumulated during one reporting cycle.

use error_stack::Report;
use serde::Serialize;

use crate::error::ReportError;
use crate::error::ReportResult;
use crate::point::FieldValue;

/// One named, schema-tagged group of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub columns: Vec<String>,
    pub points: Vec<Vec<FieldValue>>,
}

/// All series of one cycle, in append order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    series: Vec<Series>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every staged series.
    pub fn reset(&mut self) {
        self.series.clear();
    }

    /// Stages `rows` under the name `prefix + name + suffix`.
    ///
    /// Every row must be exactly as wide as `columns`; otherwise nothing is staged and
    /// [`ReportError::SchemaMismatch`] is returned.
    pub fn append_series(
        &mut self,
        prefix: &str,
        name: &str,
        suffix: &str,
        columns: &[&str],
        rows: &[&[FieldValue]],
    ) -> ReportResult<()> {
        let series_name = format!("{prefix}{name}{suffix}");

        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(Report::new(ReportError::SchemaMismatch {
                series: series_name,
                columns: columns.len(),
                values: row.len(),
            }));
        }

        self.series.push(Series {
            name: series_name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            points: rows.iter().map(|row| row.to_vec()).collect(),
        });
        Ok(())
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
