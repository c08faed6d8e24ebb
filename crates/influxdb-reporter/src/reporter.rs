//! The reporting cycle.
//!
//! One cycle stamps every metric with a single timestamp, stages one series per metric
//! and submits them in one request. A failure anywhere discards the whole cycle; the
//! next cycle starts from scratch.

use std::any::Any;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use error_stack::Report;

use crate::config::ReporterBuilder;
use crate::config::ReporterConfig;
use crate::error::ReportError;
use crate::error::ReportResult;
use crate::extract::SnapshotExtractor;
use crate::point::FieldValue;
use crate::point::MetricKind;
use crate::point::PointBuffer;
use crate::point::Tags;
use crate::registry::MetricRegistry;
use crate::registry::MetricSet;
use crate::stats::ReporterStats;
use crate::transport::Transport;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The batch was accepted by the transport.
    Sent { series: usize },
    /// The batch was discarded; the cause has been logged.
    Failed,
}

impl CycleOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, CycleOutcome::Sent { .. })
    }
}

/// State touched by a cycle, owned by whoever holds the lock.
struct Cycle<T> {
    transport: T,
    buffer: PointBuffer,
}

impl<T: Transport> Cycle<T> {
    fn append<I>(
        &mut self,
        kind: MetricKind,
        prefix: &str,
        name: &str,
        timestamp: i64,
        tags: &Tags,
        values: I,
    ) -> ReportResult<()>
    where
        I: IntoIterator<Item = FieldValue>,
    {
        let row = self.buffer.write(kind, timestamp, tags, values);
        self.transport
            .append_series(prefix, name, kind.suffix(), kind.columns(), &[row])
    }
}

pub struct InfluxdbReporter<T> {
    config: ReporterConfig,
    extractor: SnapshotExtractor,
    cycle: Mutex<Cycle<T>>,
    stats: Arc<ReporterStats>,
}

impl ReporterBuilder {
    /// Builds a reporter writing through `transport`.
    pub fn build<T: Transport>(self, transport: T) -> InfluxdbReporter<T> {
        InfluxdbReporter::new(self.build_config(), transport)
    }
}

impl<T: Transport> InfluxdbReporter<T> {
    pub fn new(config: ReporterConfig, transport: T) -> Self {
        tracing::info!(
            host = config.host(),
            environment = config.environment(),
            component = config.component(),
            prefix = config.prefix(),
            rate_unit = ?config.rate_unit(),
            duration_unit = ?config.duration_unit(),
            "Created InfluxDB reporter"
        );

        Self {
            extractor: SnapshotExtractor::new(config.rate_unit(), config.duration_unit()),
            config,
            cycle: Mutex::new(Cycle {
                transport,
                buffer: PointBuffer::new(),
            }),
            stats: Arc::new(ReporterStats::new()),
        }
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<ReporterStats> {
        &self.stats
    }

    /// Runs one cycle against the metrics of `registry` accepted by the configured filter.
    pub fn report_now(&self, registry: &MetricRegistry) -> CycleOutcome {
        self.report(&registry.metrics(self.config.filter()))
    }

    /// Runs one cycle over `metrics`.
    ///
    /// Concurrent calls are serialized. Errors never escape, not even a panicking
    /// instrument: a failed cycle is logged once and reported as [`CycleOutcome::Failed`].
    pub fn report(&self, metrics: &MetricSet) -> CycleOutcome {
        let mut cycle = self.cycle.lock().unwrap_or_else(PoisonError::into_inner);
        let timestamp = self.config.now();

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.collect_and_send(&mut cycle, timestamp, metrics)
        }))
        .unwrap_or_else(|payload| {
            Err(Report::new(ReportError::Instrument {
                message: panic_message(payload.as_ref()),
            }))
        });

        match result {
            Ok(series) => {
                tracing::debug!(series, timestamp, "Reported metrics");
                self.stats.record_success(series);
                CycleOutcome::Sent { series }
            }
            Err(report) => {
                cycle.transport.reset_request();
                match report.current_context() {
                    ReportError::SchemaMismatch { .. } => {
                        tracing::error!(
                            error = ?report,
                            "Metric batch is inconsistent, discarding cycle"
                        );
                    }
                    _ => {
                        tracing::warn!(
                            error = ?report,
                            "Unable to report to InfluxDB, discarding metrics"
                        );
                    }
                }
                self.stats.record_failure();
                CycleOutcome::Failed
            }
        }
    }

    fn collect_and_send(
        &self,
        cycle: &mut Cycle<T>,
        timestamp: i64,
        metrics: &MetricSet,
    ) -> ReportResult<usize> {
        let prefix = self.config.prefix();
        let tags = self.config.tags();
        let extractor = &self.extractor;

        cycle.transport.reset_request();

        for (name, gauge) in &metrics.gauges {
            let values = extractor.gauge(gauge.as_ref());
            cycle.append(MetricKind::Gauge, prefix, name, timestamp, tags, values)?;
        }
        for (name, counter) in &metrics.counters {
            let values = extractor.counter(counter.as_ref());
            cycle.append(MetricKind::Counter, prefix, name, timestamp, tags, values)?;
        }
        for (name, histogram) in &metrics.histograms {
            let values = extractor.histogram(histogram.as_ref());
            cycle.append(MetricKind::Histogram, prefix, name, timestamp, tags, values)?;
        }
        for (name, meter) in &metrics.meters {
            let values = extractor.meter(meter.as_ref());
            cycle.append(MetricKind::Meter, prefix, name, timestamp, tags, values)?;
        }
        for (name, timer) in &metrics.timers {
            let values = extractor.timer(timer.as_ref());
            cycle.append(MetricKind::Timer, prefix, name, timestamp, tags, values)?;
        }

        cycle.transport.send_request(true, false)?;
        Ok(metrics.len())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "instrument panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicI64;

    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::batch::Batch;
    use crate::batch::Series;
    use crate::clock::ManualClock;
    use crate::transport::MemoryTransport;

    fn builder(clock: Arc<ManualClock>) -> ReporterBuilder {
        ReporterBuilder::new().with_host("h1").with_clock(clock)
    }

    fn registry() -> MetricRegistry {
        let registry = MetricRegistry::new();
        registry.register_counter("requests", Arc::new(AtomicI64::new(5))).unwrap();
        registry.register_gauge("queueSize", || FieldValue::Integer(42)).unwrap();
        registry
    }

    #[test]
    fn report_sends_one_batch_per_cycle() {
        let transport = MemoryTransport::new();
        let reporter = builder(Arc::new(ManualClock::new(1000))).build(transport.clone());
        assert_eq!(reporter.config().host(), "h1");

        let outcome = reporter.report_now(&registry());
        assert_eq!(outcome, CycleOutcome::Sent { series: 2 });

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let names: Vec<_> = sent[0].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["queueSize.value", "requests.count"]);
    }

    #[test]
    fn failed_cycle_is_reported_not_raised() {
        let transport = MemoryTransport::new();
        transport.fail_next(1);
        let reporter = builder(Arc::new(ManualClock::new(1000))).build(transport.clone());

        assert_eq!(reporter.report_now(&registry()), CycleOutcome::Failed);
        assert_eq!(reporter.stats().cycles_failed(), 1);
        assert!(reporter.report_now(&registry()).is_sent());
        assert_eq!(reporter.stats().cycles_succeeded(), 1);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn empty_registry_sends_nothing() {
        let transport = MemoryTransport::new();
        let reporter = builder(Arc::new(ManualClock::new(1000))).build(transport.clone());

        assert_eq!(reporter.report_now(&MetricRegistry::new()), CycleOutcome::Sent { series: 0 });
        assert_eq!(transport.attempts(), 0);
    }

    #[test]
    fn filter_is_applied_by_report_now() {
        let transport = MemoryTransport::new();
        let reporter = builder(Arc::new(ManualClock::new(1000)))
            .filter(crate::registry::MetricFilter::starts_with("req"))
            .build(transport.clone());

        reporter.report_now(&registry());
        let sent = transport.sent();
        assert_eq!(sent[0].len(), 1);
        assert_eq!(sent[0][0].name.as_str(), "requests.count");
    }

    /// Rejects every append, as a sink with a narrower schema would.
    #[derive(Default)]
    struct RejectingTransport {
        batch: Batch,
    }

    impl Transport for RejectingTransport {
        fn batch(&self) -> &Batch {
            &self.batch
        }

        fn batch_mut(&mut self) -> &mut Batch {
            &mut self.batch
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
                .append_series(prefix, name, suffix, &columns[..columns.len() - 1], rows)
        }

        fn submit(&mut self, _series: &[Series], _keep_alive: bool) -> ReportResult<()> {
            Err(Report::new(ReportError::Network {
                message: "unreachable".into(),
            }))
        }
    }

    #[test]
    fn schema_mismatch_aborts_cycle() {
        let reporter =
            builder(Arc::new(ManualClock::new(1000))).build(RejectingTransport::default());

        assert_eq!(reporter.report_now(&registry()), CycleOutcome::Failed);
        assert_eq!(reporter.stats().cycles_failed(), 1);
    }

    #[test]
    fn panicking_instrument_fails_only_its_cycle() {
        let transport = MemoryTransport::new();
        let reporter = builder(Arc::new(ManualClock::new(1000))).build(transport.clone());
        let registry = registry();
        registry
            .register_gauge("boom", || -> FieldValue { panic!("gauge read failed") })
            .unwrap();

        assert_eq!(reporter.report_now(&registry), CycleOutcome::Failed);
        assert_eq!(reporter.stats().cycles_failed(), 1);
        assert_eq!(transport.attempts(), 0);

        registry.remove("boom");
        assert_eq!(reporter.report_now(&registry), CycleOutcome::Sent { series: 2 });
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let names: Vec<_> = sent[0].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["queueSize.value", "requests.count"]);
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42), "instrument panicked");
    }
}
