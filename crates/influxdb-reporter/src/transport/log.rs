use super::Transport;
use crate::batch::Batch;
use crate::batch::Series;
use crate::encoders::create_encoder;
use crate::encoders::BatchEncoder;
use crate::encoders::Payload;
use crate::encoders::WireFormat;
use crate::error::ReportResult;

/// Tracing target carrying encoded batches.
pub const METRICS_TARGET: &str = "metrics";

/// Writes each batch as a single event on the [`METRICS_TARGET`] tracing target.
///
/// The binary routes that target to a rolling file, so a log shipper can forward the
/// lines to InfluxDB.
pub struct LogTransport {
    encoder: Box<dyn BatchEncoder>,
    batch: Batch,
}

impl LogTransport {
    pub fn new(format: WireFormat) -> Self {
        Self {
            encoder: create_encoder(format),
            batch: Batch::new(),
        }
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new(WireFormat::Line)
    }
}

impl Transport for LogTransport {
    fn batch(&self) -> &Batch {
        &self.batch
    }

    fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    fn submit(&mut self, series: &[Series], _keep_alive: bool) -> ReportResult<()> {
        let payload = Payload::from(self.encoder.encode(series)?);
        tracing::info!(target: METRICS_TARGET, msg = %payload);
        Ok(())
    }
}
