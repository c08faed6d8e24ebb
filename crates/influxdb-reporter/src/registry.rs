//! Named instruments and the sorted views handed to the reporter.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use error_stack::Report;

use crate::error::RegistryError;
use crate::instrument::Counter;
use crate::instrument::Gauge;
use crate::instrument::Histogram;
use crate::instrument::Metered;
use crate::instrument::Timer;
use crate::point::MetricKind;

/// Any registered instrument.
#[derive(Clone)]
pub enum Metric {
    Gauge(Arc<dyn Gauge>),
    Counter(Arc<dyn Counter>),
    Histogram(Arc<dyn Histogram>),
    Meter(Arc<dyn Metered>),
    Timer(Arc<dyn Timer>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metric::{:?}", self.kind())
    }
}

type Predicate = dyn Fn(&str, &Metric) -> bool + Send + Sync;

/// Decides which metrics reach the reporter.
#[derive(Clone)]
pub struct MetricFilter(Arc<Predicate>);

impl MetricFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str, &Metric) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Accepts every metric.
    pub fn all() -> Self {
        Self::new(|_, _| true)
    }

    /// Accepts metrics whose name starts with `prefix`.
    pub fn starts_with(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |name, _| name.starts_with(&prefix))
    }

    pub fn matches(&self, name: &str, metric: &Metric) -> bool {
        (self.0)(name, metric)
    }
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for MetricFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MetricFilter")
    }
}

/// Instruments of one reporting cycle, one map per kind, ordered by name.
#[derive(Clone, Default)]
pub struct MetricSet {
    pub gauges: BTreeMap<String, Arc<dyn Gauge>>,
    pub counters: BTreeMap<String, Arc<dyn Counter>>,
    pub histograms: BTreeMap<String, Arc<dyn Histogram>>,
    pub meters: BTreeMap<String, Arc<dyn Metered>>,
    pub timers: BTreeMap<String, Arc<dyn Timer>>,
}

impl MetricSet {
    pub fn len(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.histograms.len()
            + self.meters.len()
            + self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, name: String, metric: Metric) {
        match metric {
            Metric::Gauge(m) => {
                self.gauges.insert(name, m);
            }
            Metric::Counter(m) => {
                self.counters.insert(name, m);
            }
            Metric::Histogram(m) => {
                self.histograms.insert(name, m);
            }
            Metric::Meter(m) => {
                self.meters.insert(name, m);
            }
            Metric::Timer(m) => {
                self.timers.insert(name, m);
            }
        }
    }
}

/// Single namespace of named instruments.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        metric: Metric,
    ) -> Result<(), Report<RegistryError>> {
        let name = name.into();
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        if metrics.contains_key(&name) {
            return Err(Report::new(RegistryError::DuplicateName { name }));
        }
        tracing::debug!(metric = %name, kind = ?metric.kind(), "Registered metric");
        metrics.insert(name, metric);
        Ok(())
    }

    pub fn register_gauge<G: Gauge + 'static>(
        &self,
        name: impl Into<String>,
        gauge: G,
    ) -> Result<(), Report<RegistryError>> {
        self.register(name, Metric::Gauge(Arc::new(gauge)))
    }

    pub fn register_counter(
        &self,
        name: impl Into<String>,
        counter: Arc<dyn Counter>,
    ) -> Result<(), Report<RegistryError>> {
        self.register(name, Metric::Counter(counter))
    }

    pub fn remove(&self, name: &str) -> Option<Metric> {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted per-kind view of every metric accepted by `filter`.
    pub fn metrics(&self, filter: &MetricFilter) -> MetricSet {
        let metrics = self.metrics.read().unwrap_or_else(PoisonError::into_inner);
        let mut set = MetricSet::default();
        for (name, metric) in metrics.iter() {
            if filter.matches(name, metric) {
                set.insert(name.clone(), metric.clone());
            }
        }
        set
    }
}
