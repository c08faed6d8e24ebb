//! Turns instruments into the kind-specific tail of a row.
//!
//! Each method returns exactly `columns().len() - 4` values; the common
//! `time, host, environment, component` prefix is added by the point buffer.

use crate::config::TimeUnit;
use crate::instrument::Counter;
use crate::instrument::Gauge;
use crate::instrument::Histogram;
use crate::instrument::Metered;
use crate::instrument::Snapshot;
use crate::instrument::Timer;
use crate::point::FieldValue;

#[derive(Debug, Clone, Copy)]
pub struct SnapshotExtractor {
    rate_factor: f64,
    duration_factor: f64,
}

impl SnapshotExtractor {
    pub fn new(rate_unit: TimeUnit, duration_unit: TimeUnit) -> Self {
        Self {
            rate_factor: rate_unit.rate_factor(),
            duration_factor: duration_unit.duration_factor(),
        }
    }

    pub fn convert_rate(&self, per_second: f64) -> f64 {
        per_second * self.rate_factor
    }

    pub fn convert_duration(&self, nanos: f64) -> f64 {
        nanos * self.duration_factor
    }

    /// Passed through as-is.
    pub fn gauge(&self, gauge: &dyn Gauge) -> [FieldValue; 1] {
        [gauge.value()]
    }

    pub fn counter(&self, counter: &dyn Counter) -> [FieldValue; 1] {
        [FieldValue::Integer(counter.count())]
    }

    /// Raw sample magnitudes, no conversion.
    pub fn histogram(&self, histogram: &dyn Histogram) -> [FieldValue; 10] {
        let s = histogram.snapshot();
        [
            FieldValue::Integer(s.size as i64),
            FieldValue::Integer(s.min),
            FieldValue::Integer(s.max),
            FieldValue::Float(s.mean),
            FieldValue::Float(s.std_dev),
            FieldValue::Float(s.median),
            FieldValue::Float(s.p75),
            FieldValue::Float(s.p95),
            FieldValue::Float(s.p99),
            FieldValue::Float(s.p999),
        ]
    }

    pub fn meter(&self, meter: &dyn Metered) -> [FieldValue; 5] {
        let [one, five, fifteen, mean] = self.rates(meter);
        [FieldValue::Integer(meter.count()), one, five, fifteen, mean]
    }

    /// Durations converted from nanoseconds, count is the snapshot size.
    pub fn timer(&self, timer: &dyn Timer) -> [FieldValue; 14] {
        let s: Snapshot = timer.snapshot();
        let d = |nanos: f64| FieldValue::Float(self.convert_duration(nanos));
        let [one, five, fifteen, mean] = self.rates(timer);
        [
            FieldValue::Integer(s.size as i64),
            d(s.min as f64),
            d(s.max as f64),
            d(s.mean),
            d(s.std_dev),
            d(s.median),
            d(s.p75),
            d(s.p95),
            d(s.p99),
            d(s.p999),
            one,
            five,
            fifteen,
            mean,
        ]
    }

    fn rates<M: Metered + ?Sized>(&self, metered: &M) -> [FieldValue; 4] {
        [
            metered.one_minute_rate(),
            metered.five_minute_rate(),
            metered.fifteen_minute_rate(),
            metered.mean_rate(),
        ]
        .map(|rate| FieldValue::Float(self.convert_rate(rate)))
    }
}
