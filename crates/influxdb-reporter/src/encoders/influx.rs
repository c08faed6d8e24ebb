use influxdb_line_protocol::LineProtocolBuilder;

use super::BatchEncoder;
use super::WireFormat;
use crate::batch::Series;
use crate::error::ReportResult;
use crate::point::FieldValue;
use crate::point::TAG_COLUMNS;
use crate::point::TIME_COLUMN;

/// InfluxDB line protocol encoder
///
/// One line per row: the series name is the measurement, the fixed dimensions become
/// tags, `time` becomes the timestamp (milliseconds) and every other column a field.
pub struct LineEncoder;

impl LineEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LineEncoder {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! add_field {
    ($builder:expr, $key:expr, $value:expr) => {
        match $value {
            FieldValue::String(s) => $builder.field($key, s.as_str()),
            FieldValue::Integer(i) => $builder.field($key, *i),
            FieldValue::UnsignedInteger(u) => $builder.field($key, *u),
            FieldValue::Float(f) => $builder.field($key, *f),
            FieldValue::Boolean(b) => $builder.field($key, *b),
        }
    };
}

impl BatchEncoder for LineEncoder {
    fn format(&self) -> WireFormat {
        WireFormat::Line
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn encode(&self, series: &[Series]) -> ReportResult<Vec<u8>> {
        let mut body = Vec::new();
        for s in series {
            for row in &s.points {
                match encode_line(&s.name, &s.columns, row) {
                    Some(line) => body.extend_from_slice(&line),
                    None => tracing::debug!(
                        series = %s.name,
                        "Skipping row without any encodable field"
                    ),
                }
            }
        }
        Ok(body)
    }
}

fn encode_line(measurement: &str, columns: &[String], row: &[FieldValue]) -> Option<Vec<u8>> {
    let mut builder = LineProtocolBuilder::new().measurement(measurement);
    let mut timestamp = None;
    let mut fields = Vec::with_capacity(row.len());

    for (column, value) in columns.iter().zip(row) {
        let column = column.as_str();
        match value {
            FieldValue::Integer(ts) if column == TIME_COLUMN => timestamp = Some(*ts),
            FieldValue::String(tag) if TAG_COLUMNS.contains(&column) => {
                // line protocol has no empty tag values
                if !tag.is_empty() {
                    builder = builder.tag(column, tag);
                }
            }
            FieldValue::Float(f) if !f.is_finite() => {}
            _ => fields.push((column, value)),
        }
    }

    let ((first_key, first_value), rest) = fields.split_first()?;
    let mut line = add_field!(builder, first_key, *first_value);
    for (key, value) in rest {
        line = add_field!(line, key, *value);
    }

    let built = match timestamp {
        Some(ts) => line.timestamp(ts).close_line().build(),
        None => line.close_line().build(),
    };
    Some(built)
}
