//! Read-only views of live instruments.
//!
//! The reporter never mutates an instrument, it only asks for the current value or a
//! statistical [`Snapshot`]. Implementations are expected to be cheap and infallible.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use crate::point::FieldValue;

/// An instantaneous value of any type.
pub trait Gauge: Send + Sync {
    fn value(&self) -> FieldValue;
}

/// A monotonic count.
pub trait Counter: Send + Sync {
    fn count(&self) -> i64;
}

/// Anything that can hand out a statistical snapshot of recorded samples.
pub trait Sampling: Send + Sync {
    fn snapshot(&self) -> Snapshot;
}

/// Event counts and exponentially-weighted rates, all per second.
pub trait Metered: Send + Sync {
    fn count(&self) -> i64;
    fn one_minute_rate(&self) -> f64;
    fn five_minute_rate(&self) -> f64;
    fn fifteen_minute_rate(&self) -> f64;
    fn mean_rate(&self) -> f64;
}

/// Distribution of arbitrary sample values.
pub trait Histogram: Sampling {}

/// Durations in nanoseconds plus the rate at which they were recorded.
pub trait Timer: Metered + Sampling {}

/// Point-in-time statistics over a sample set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub size: usize,
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Snapshot {
    /// Computes a snapshot over `values` using linear interpolation between the
    /// closest ranks.
    pub fn from_values(values: &[i64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let n = sorted.len() as f64;
        let mean = sorted.iter().map(|v| *v as f64).sum::<f64>() / n;
        let std_dev = if sorted.len() > 1 {
            let variance = sorted
                .iter()
                .map(|v| {
                    let diff = *v as f64 - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Self {
            size: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            std_dev,
            median: quantile(&sorted, 0.5),
            p75: quantile(&sorted, 0.75),
            p95: quantile(&sorted, 0.95),
            p99: quantile(&sorted, 0.99),
            p999: quantile(&sorted, 0.999),
        }
    }
}

fn quantile(sorted: &[i64], q: f64) -> f64 {
    let pos = q * (sorted.len() as f64 + 1.0);
    let index = pos as usize;

    if index < 1 {
        return sorted[0] as f64;
    }
    if index >= sorted.len() {
        return sorted[sorted.len() - 1] as f64;
    }

    let lower = sorted[index - 1] as f64;
    let upper = sorted[index] as f64;
    lower + (pos - pos.floor()) * (upper - lower)
}

impl<F> Gauge for F
where
    F: Fn() -> FieldValue + Send + Sync,
{
    fn value(&self) -> FieldValue {
        self()
    }
}

impl Counter for AtomicI64 {
    fn count(&self) -> i64 {
        self.load(Ordering::Relaxed)
    }
}
