use error_stack::ResultExt;

use super::BatchEncoder;
use super::WireFormat;
use crate::batch::Series;
use crate::error::ReportError;
use crate::error::ReportResult;

/// JSON encoder for the InfluxDB 0.8 series endpoint
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchEncoder for JsonEncoder {
    fn format(&self) -> WireFormat {
        WireFormat::Json
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    // non-finite floats serialize as null
    fn encode(&self, series: &[Series]) -> ReportResult<Vec<u8>> {
        serde_json::to_vec(series).change_context(ReportError::Encoding {
            message: "Failed to serialize series to JSON".into(),
        })
    }
}
