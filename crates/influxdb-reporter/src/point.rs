//! Row values, per-kind column schemas and the reusable point buffer.

use serde::Serialize;

/// A single typed value inside a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    UnsignedInteger(u64),
    Float(f64),
    Boolean(bool),
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UnsignedInteger(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

pub const TIME_COLUMN: &str = "time";

/// Columns that carry the reporter's fixed dimensions.
pub const TAG_COLUMNS: [&str; 3] = ["host", "environment", "component"];

#[rustfmt::skip]
const TIMER_COLUMNS: [&str; 18] = [
    "time", "host", "environment", "component", "count",
    "min", "max", "mean", "std-dev",
    "50-pct", "75-pct", "95-pct", "99-pct", "999-pct",
    "1m-rate", "5m-rate", "15m-rate", "mean-rate",
];

#[rustfmt::skip]
const HISTOGRAM_COLUMNS: [&str; 14] = [
    "time", "host", "environment", "component", "count",
    "min", "max", "mean", "std-dev",
    "50-pct", "75-pct", "95-pct", "99-pct", "999-pct",
];

const COUNTER_COLUMNS: [&str; 5] = ["time", "host", "environment", "component", "count"];

const GAUGE_COLUMNS: [&str; 5] = ["time", "host", "environment", "component", "value"];

#[rustfmt::skip]
const METER_COLUMNS: [&str; 9] = [
    "time", "host", "environment", "component", "count",
    "1m-rate", "5m-rate", "15m-rate", "mean-rate",
];

/// The five instrument kinds, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Gauge,
        MetricKind::Counter,
        MetricKind::Histogram,
        MetricKind::Meter,
        MetricKind::Timer,
    ];

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            MetricKind::Gauge => &GAUGE_COLUMNS,
            MetricKind::Counter => &COUNTER_COLUMNS,
            MetricKind::Histogram => &HISTOGRAM_COLUMNS,
            MetricKind::Meter => &METER_COLUMNS,
            MetricKind::Timer => &TIMER_COLUMNS,
        }
    }

    /// Appended to the metric name to form the series name.
    pub fn suffix(self) -> &'static str {
        match self {
            MetricKind::Gauge => ".value",
            MetricKind::Counter => ".count",
            MetricKind::Histogram => ".histogram",
            MetricKind::Meter => ".meter",
            MetricKind::Timer => ".timer",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Fixed dimensions stamped on every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    pub host: String,
    pub environment: String,
    pub component: String,
}

/// One reusable row per metric kind.
///
/// A slot is overwritten by every [`PointBuffer::write`] and only valid until the next
/// write to the same kind. Slots keep their capacity, so steady-state cycles do not
/// grow the buffers.
#[derive(Debug)]
pub struct PointBuffer {
    slots: [Vec<FieldValue>; 5],
}

impl Default for PointBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PointBuffer {
    pub fn new() -> Self {
        Self {
            slots: MetricKind::ALL.map(|kind| Vec::with_capacity(kind.columns().len())),
        }
    }

    /// Overwrites the slot of `kind` with the common prefix
    /// `[timestamp, host, environment, component]` followed by `values`.
    pub fn write<I>(
        &mut self,
        kind: MetricKind,
        timestamp: i64,
        tags: &Tags,
        values: I,
    ) -> &[FieldValue]
    where
        I: IntoIterator<Item = FieldValue>,
    {
        let slot = &mut self.slots[kind.slot()];
        slot.clear();
        slot.push(FieldValue::Integer(timestamp));
        slot.push(FieldValue::String(tags.host.clone()));
        slot.push(FieldValue::String(tags.environment.clone()));
        slot.push(FieldValue::String(tags.component.clone()));
        slot.extend(values);
        slot
    }
}
