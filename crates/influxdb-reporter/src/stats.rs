//! Self-observation counters of a reporter.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use error_stack::Report;

use crate::error::RegistryError;
use crate::instrument::Counter;
use crate::point::FieldValue;
use crate::registry::MetricRegistry;

#[derive(Debug, Default)]
pub struct ReporterStats {
    cycles_succeeded: AtomicU64,
    cycles_failed: AtomicU64,
    last_series: AtomicU64,
}

impl ReporterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self, series: usize) {
        self.cycles_succeeded.fetch_add(1, Ordering::Relaxed);
        self.last_series.store(series as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_succeeded(&self) -> u64 {
        self.cycles_succeeded.load(Ordering::Relaxed)
    }

    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    /// Series count of the last successful cycle.
    pub fn last_series(&self) -> u64 {
        self.last_series.load(Ordering::Relaxed)
    }

    /// Registers `{prefix}cycles-succeeded`, `{prefix}cycles-failed` (counters) and
    /// `{prefix}last-series` (gauge).
    pub fn register_into(
        self: &Arc<Self>,
        registry: &MetricRegistry,
        prefix: &str,
    ) -> Result<(), Report<RegistryError>> {
        registry.register_counter(
            format!("{prefix}cycles-succeeded"),
            Arc::new(StatCounter {
                stats: Arc::clone(self),
                read: ReporterStats::cycles_succeeded,
            }),
        )?;
        registry.register_counter(
            format!("{prefix}cycles-failed"),
            Arc::new(StatCounter {
                stats: Arc::clone(self),
                read: ReporterStats::cycles_failed,
            }),
        )?;

        let stats = Arc::clone(self);
        registry.register_gauge(format!("{prefix}last-series"), move || {
            FieldValue::UnsignedInteger(stats.last_series())
        })
    }
}

struct StatCounter {
    stats: Arc<ReporterStats>,
    read: fn(&ReporterStats) -> u64,
}

impl Counter for StatCounter {
    fn count(&self) -> i64 {
        i64::try_from((self.read)(&self.stats)).unwrap_or(i64::MAX)
    }
}
