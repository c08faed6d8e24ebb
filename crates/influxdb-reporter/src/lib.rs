//! Periodic InfluxDB reporter for in-process metrics.
//!
//! A [`MetricRegistry`] holds gauges, counters, histograms, meters and timers. On every
//! cycle an [`InfluxdbReporter`] snapshots them into one series per metric, stamps each
//! row with the cycle timestamp and the fixed `host`, `environment` and `component`
//! dimensions, and submits the batch through a [`Transport`] in a single write.

pub mod batch;
pub mod clock;
pub mod config;
pub mod encoders;
pub mod error;
pub mod extract;
pub mod instrument;
pub mod point;
pub mod registry;
pub mod reporter;
pub mod schedule;
pub mod stats;
pub mod transport;

pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use config::ReporterBuilder;
pub use config::ReporterConfig;
pub use config::TimeUnit;
pub use encoders::WireFormat;
pub use error::RegistryError;
pub use error::ReportError;
pub use error::ReportResult;
pub use point::FieldValue;
pub use registry::Metric;
pub use registry::MetricFilter;
pub use registry::MetricRegistry;
pub use registry::MetricSet;
pub use reporter::CycleOutcome;
pub use reporter::InfluxdbReporter;
pub use schedule::Schedule;
pub use schedule::ScheduledReporter;
pub use stats::ReporterStats;
pub use transport::Transport;
