//! End-to-end reporting cycles through the in-memory transport.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use influxdb_reporter::batch::Series;
use influxdb_reporter::encoders::create_encoder;
use influxdb_reporter::instrument::Histogram;
use influxdb_reporter::instrument::Metered;
use influxdb_reporter::instrument::Sampling;
use influxdb_reporter::instrument::Snapshot;
use influxdb_reporter::instrument::Timer;
use influxdb_reporter::point::MetricKind;
use influxdb_reporter::transport::MemoryTransport;
use influxdb_reporter::CycleOutcome;
use influxdb_reporter::FieldValue;
use influxdb_reporter::InfluxdbReporter;
use influxdb_reporter::ManualClock;
use influxdb_reporter::Metric;
use influxdb_reporter::MetricRegistry;
use influxdb_reporter::ReporterBuilder;
use influxdb_reporter::TimeUnit;
use influxdb_reporter::WireFormat;
use similar_asserts::assert_eq;
use test_log::test;

struct Rates;

impl Metered for Rates {
    fn count(&self) -> i64 {
        12
    }
    fn one_minute_rate(&self) -> f64 {
        0.5
    }
    fn five_minute_rate(&self) -> f64 {
        0.25
    }
    fn fifteen_minute_rate(&self) -> f64 {
        0.125
    }
    fn mean_rate(&self) -> f64 {
        2.0
    }
}

struct Samples(Vec<i64>);

impl Sampling for Samples {
    fn snapshot(&self) -> Snapshot {
        Snapshot::from_values(&self.0)
    }
}

impl Histogram for Samples {}

/// Latencies of 1ms..4ms recorded at [`Rates`].
struct Latencies(Samples);

impl Latencies {
    fn new() -> Self {
        Self(Samples(vec![1_000_000, 2_000_000, 3_000_000, 4_000_000]))
    }
}

impl Sampling for Latencies {
    fn snapshot(&self) -> Snapshot {
        self.0.snapshot()
    }
}

impl Metered for Latencies {
    fn count(&self) -> i64 {
        Rates.count()
    }
    fn one_minute_rate(&self) -> f64 {
        Rates.one_minute_rate()
    }
    fn five_minute_rate(&self) -> f64 {
        Rates.five_minute_rate()
    }
    fn fifteen_minute_rate(&self) -> f64 {
        Rates.fifteen_minute_rate()
    }
    fn mean_rate(&self) -> f64 {
        Rates.mean_rate()
    }
}

impl Timer for Latencies {}

fn reporter(
    builder: ReporterBuilder,
    clock: &Arc<ManualClock>,
) -> (InfluxdbReporter<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::new();
    let reporter = builder
        .with_host("h1")
        .with_clock(clock.clone())
        .build(transport.clone());
    (reporter, transport)
}

fn full_registry() -> MetricRegistry {
    let registry = MetricRegistry::new();
    registry.register_gauge("queueSize", || FieldValue::Integer(42)).unwrap();
    registry.register_counter("requests", Arc::new(AtomicI64::new(5))).unwrap();
    registry
        .register("payload", Metric::Histogram(Arc::new(Samples(vec![10, 20, 30]))))
        .unwrap();
    registry.register("events", Metric::Meter(Arc::new(Rates))).unwrap();
    registry.register("latency", Metric::Timer(Arc::new(Latencies::new()))).unwrap();
    registry
}

fn only_batch(transport: &MemoryTransport) -> Vec<Series> {
    let mut sent = transport.sent();
    assert_eq!(sent.len(), 1);
    sent.remove(0)
}

#[test]
fn counter_with_prefix_environment_and_component() {
    let clock = Arc::new(ManualClock::new(1000));
    let (reporter, transport) = reporter(
        ReporterBuilder::new()
            .prefixed_with("app.")
            .with_environment("prod")
            .with_component("web"),
        &clock,
    );
    let registry = MetricRegistry::new();
    registry.register_counter("requests", Arc::new(AtomicI64::new(5))).unwrap();

    assert_eq!(reporter.report_now(&registry), CycleOutcome::Sent { series: 1 });

    let batch = only_batch(&transport);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].name, "app.requests.count");
    assert_eq!(batch[0].columns, vec!["time", "host", "environment", "component", "count"]);
    assert_eq!(
        batch[0].points,
        vec![vec![
            FieldValue::Integer(1000),
            FieldValue::from("h1"),
            FieldValue::from("prod"),
            FieldValue::from("web"),
            FieldValue::Integer(5),
        ]]
    );
}

#[test]
fn gauge_without_prefix_environment_or_component() {
    let clock = Arc::new(ManualClock::new(77));
    let (reporter, transport) = reporter(ReporterBuilder::new(), &clock);
    let registry = MetricRegistry::new();
    registry.register_gauge("queueSize", || FieldValue::Integer(42)).unwrap();

    reporter.report_now(&registry);

    let batch = only_batch(&transport);
    assert_eq!(batch[0].name, "queueSize.value");
    assert_eq!(
        batch[0].points[0],
        vec![
            FieldValue::Integer(77),
            FieldValue::from("h1"),
            FieldValue::from(""),
            FieldValue::from(""),
            FieldValue::Integer(42),
        ]
    );
}

#[test]
fn every_row_matches_its_schema_and_shares_the_cycle_stamp() {
    let clock = Arc::new(ManualClock::new(5_000));
    let (reporter, transport) = reporter(ReporterBuilder::new().with_environment("stage"), &clock);

    reporter.report_now(&full_registry());

    let batch = only_batch(&transport);
    assert_eq!(batch.len(), 5);
    for series in &batch {
        assert_eq!(series.points.len(), 1, "{}", series.name);
        let row = &series.points[0];
        assert_eq!(row.len(), series.columns.len(), "{}", series.name);
        assert_eq!(
            row[..4].to_vec(),
            vec![
                FieldValue::Integer(5_000),
                FieldValue::from("h1"),
                FieldValue::from("stage"),
                FieldValue::from(""),
            ]
        );
    }
}

#[test]
fn kinds_are_reported_in_fixed_order() {
    let clock = Arc::new(ManualClock::new(1));
    let (reporter, transport) = reporter(ReporterBuilder::new(), &clock);

    reporter.report_now(&full_registry());

    let names: Vec<_> = only_batch(&transport).into_iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec![
            "queueSize.value",
            "requests.count",
            "payload.histogram",
            "events.meter",
            "latency.timer",
        ]
    );
    for (series, kind) in only_batch(&transport).iter().zip(MetricKind::ALL) {
        assert!(series.name.ends_with(kind.suffix()));
    }
}

#[test]
fn names_are_sorted_within_a_kind() {
    let clock = Arc::new(ManualClock::new(1));
    let (reporter, transport) = reporter(ReporterBuilder::new(), &clock);
    let registry = MetricRegistry::new();
    for name in ["b", "a", "c"] {
        registry.register_counter(name, Arc::new(AtomicI64::new(0))).unwrap();
    }

    reporter.report_now(&registry);

    let names: Vec<_> = only_batch(&transport).into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["a.count", "b.count", "c.count"]);
}

#[test]
fn rates_and_durations_are_converted() {
    let clock = Arc::new(ManualClock::new(1));
    let (reporter, transport) = reporter(
        ReporterBuilder::new()
            .convert_rates_to(TimeUnit::Minutes)
            .convert_durations_to(TimeUnit::Milliseconds),
        &clock,
    );

    reporter.report_now(&full_registry());
    let batch = only_batch(&transport);
    let row_of = |name: &str| {
        batch
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.points[0][4..].to_vec())
            .unwrap()
    };

    assert_eq!(
        row_of("events.meter"),
        vec![
            FieldValue::Integer(12),
            FieldValue::Float(30.0),
            FieldValue::Float(15.0),
            FieldValue::Float(7.5),
            FieldValue::Float(120.0),
        ]
    );

    let timer = row_of("latency.timer");
    let snapshot = Latencies::new().snapshot();
    let ms = TimeUnit::Milliseconds.duration_factor();
    assert_eq!(timer[0], FieldValue::Integer(4));
    assert_eq!(timer[1], FieldValue::Float(1_000_000.0 * ms));
    assert_eq!(timer[2], FieldValue::Float(4_000_000.0 * ms));
    assert_eq!(timer[3], FieldValue::Float(snapshot.mean * ms));
    assert_eq!(timer[5], FieldValue::Float(snapshot.median * ms));
    assert_eq!(timer[10..].to_vec(), row_of("events.meter")[1..].to_vec());

    // histograms keep raw magnitudes
    let histogram = row_of("payload.histogram");
    assert_eq!(
        histogram[..3].to_vec(),
        vec![
            FieldValue::Integer(3),
            FieldValue::Integer(10),
            FieldValue::Integer(30),
        ]
    );
    assert_eq!(histogram[3], FieldValue::Float(20.0));
}

#[test]
fn unchanged_registry_yields_identical_batches_but_for_time() {
    let clock = Arc::new(ManualClock::new(1_000));
    let (reporter, transport) = reporter(ReporterBuilder::new().prefixed_with("svc"), &clock);
    let registry = full_registry();

    reporter.report_now(&registry);
    clock.advance(10_000);
    reporter.report_now(&registry);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    for (first, second) in sent[0].iter().zip(&sent[1]) {
        assert_eq!(first.name, second.name);
        assert_eq!(first.columns, second.columns);
        assert_eq!(first.points[0][0], FieldValue::Integer(1_000));
        assert_eq!(second.points[0][0], FieldValue::Integer(11_000));
        assert_eq!(first.points[0][1..].to_vec(), second.points[0][1..].to_vec());
    }
}

#[test]
fn failed_cycle_does_not_leak_into_the_next() {
    let clock = Arc::new(ManualClock::new(1_000));
    let (reporter, transport) = reporter(ReporterBuilder::new(), &clock);
    let counter = Arc::new(AtomicI64::new(1));
    let registry = MetricRegistry::new();
    registry.register_counter("requests", counter.clone()).unwrap();

    transport.fail_next(1);
    assert_eq!(reporter.report_now(&registry), CycleOutcome::Failed);

    counter.store(2, Ordering::SeqCst);
    clock.set(2_000);
    assert_eq!(reporter.report_now(&registry), CycleOutcome::Sent { series: 1 });

    let batch = only_batch(&transport);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].points[0][0], FieldValue::Integer(2_000));
    assert_eq!(batch[0].points[0][4], FieldValue::Integer(2));
    assert_eq!(transport.attempts(), 2);
    assert_eq!(reporter.stats().cycles_failed(), 1);
    assert_eq!(reporter.stats().cycles_succeeded(), 1);
}

#[test]
fn concurrent_cycles_are_serialized() {
    let clock = Arc::new(ManualClock::new(1));
    let (reporter, transport) = reporter(ReporterBuilder::new(), &clock);
    let reporter = Arc::new(reporter);
    let registry = Arc::new(full_registry());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reporter = reporter.clone();
            let registry = registry.clone();
            std::thread::spawn(move || reporter.report_now(&registry))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_sent());
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 8);
    for batch in sent {
        assert_eq!(batch.len(), 5);
    }
}

#[test]
fn json_body_of_a_cycle() {
    let clock = Arc::new(ManualClock::new(1000));
    let (reporter, transport) = reporter(
        ReporterBuilder::new()
            .prefixed_with("app")
            .with_environment("prod")
            .with_component("web"),
        &clock,
    );
    let registry = MetricRegistry::new();
    registry.register_counter("requests", Arc::new(AtomicI64::new(5))).unwrap();
    reporter.report_now(&registry);

    let body = create_encoder(WireFormat::Json)
        .encode(&only_batch(&transport))
        .unwrap();
    assert_eq!(
        String::from_utf8(body).unwrap(),
        r#"[{"name":"app.requests.count","columns":["time","host","environment","component","count"],"points":[[1000,"h1","prod","web",5]]}]"#
    );
}
