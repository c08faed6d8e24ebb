use std::fmt;

use clap::ValueEnum;

use crate::batch::Series;
use crate::error::ReportResult;

pub mod influx;
pub mod json;

/// Body format of a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WireFormat {
    /// InfluxDB 0.8 series API, JSON array of `{name, columns, points}`
    Json,
    /// InfluxDB line protocol
    Line,
}

/// Trait for encoding a batch of series into a request body
pub trait BatchEncoder: Send + Sync {
    fn format(&self) -> WireFormat;

    fn content_type(&self) -> &'static str;

    fn encode(&self, series: &[Series]) -> ReportResult<Vec<u8>>;
}

/// Factory function to create encoders based on the wire format
pub fn create_encoder(format: WireFormat) -> Box<dyn BatchEncoder> {
    match format {
        WireFormat::Json => Box::new(json::JsonEncoder::new()),
        WireFormat::Line => Box::new(influx::LineEncoder::new()),
    }
}

// Wrapper struct for an encoded body that implements Display
pub struct Payload(Vec<u8>);

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "");
        }

        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s.trim_end()),
            Err(_) => {
                tracing::error!(
                    target: "influxdb_reporter::encoders",
                    msg = "Failed to convert payload to string",
                );
                Err(fmt::Error)
            }
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}
