//! Outbound side of a reporting cycle.
//!
//! A transport stages series with [`Transport::append_series`] and submits them as one
//! request with [`Transport::send_request`]. Implementations only decide how a staged
//! batch reaches the sink; staging and discard rules are shared.

use crate::batch::Batch;
use crate::batch::Series;
use crate::error::ReportResult;
use crate::point::FieldValue;

pub mod http;
pub mod log;
pub mod memory;

pub use http::HttpConfig;
pub use http::HttpTransport;
pub use log::LogTransport;
pub use memory::MemoryTransport;

pub trait Transport: Send {
    fn batch(&self) -> &Batch;

    fn batch_mut(&mut self) -> &mut Batch;

    /// Delivers `series` to the sink in a single write.
    fn submit(&mut self, series: &[Series], keep_alive: bool) -> ReportResult<()>;

    /// Discards anything staged since the last send.
    fn reset_request(&mut self) {
        self.batch_mut().reset();
    }

    fn append_series(
        &mut self,
        prefix: &str,
        name: &str,
        suffix: &str,
        columns: &[&str],
        rows: &[&[FieldValue]],
    ) -> ReportResult<()> {
        self.batch_mut()
            .append_series(prefix, name, suffix, columns, rows)
    }

    fn has_series_data(&self) -> bool {
        !self.batch().is_empty()
    }

    /// Submits the staged series.
    ///
    /// Nothing is sent when no series are staged. Staged series are dropped once the
    /// send succeeds, or regardless of the outcome when `complete` is set; a failed
    /// incomplete send keeps them for the next attempt.
    fn send_request(&mut self, complete: bool, keep_alive: bool) -> ReportResult<()> {
        if !self.has_series_data() {
            tracing::trace!("No series staged, skipping send");
            return Ok(());
        }

        let batch = std::mem::take(self.batch_mut());
        let result = self.submit(batch.series(), keep_alive);
        if result.is_err() && !complete {
            *self.batch_mut() = batch;
        }
        result
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn batch(&self) -> &Batch {
        (**self).batch()
    }

    fn batch_mut(&mut self) -> &mut Batch {
        (**self).batch_mut()
    }

    fn submit(&mut self, series: &[Series], keep_alive: bool) -> ReportResult<()> {
        (**self).submit(series, keep_alive)
    }

    fn reset_request(&mut self) {
        (**self).reset_request()
    }

    fn append_series(
        &mut self,
        prefix: &str,
        name: &str,
        suffix: &str,
        columns: &[&str],
        rows: &[&[FieldValue]],
    ) -> ReportResult<()> {
        (**self).append_series(prefix, name, suffix, columns, rows)
    }

    fn has_series_data(&self) -> bool {
        (**self).has_series_data()
    }

    fn send_request(&mut self, complete: bool, keep_alive: bool) -> ReportResult<()> {
        (**self).send_request(complete, keep_alive)
    }
}
