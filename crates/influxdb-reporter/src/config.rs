//! Static per-process reporter configuration.

use std::fmt;
use std::io;
use std::sync::Arc;

use clap::ValueEnum;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::point::Tags;
use crate::registry::MetricFilter;

/// Substituted when the local host name cannot be resolved.
pub const UNKNOWN_HOST: &str = "unknown.host";

/// Separator between the name prefix and the metric name.
pub const PREFIX_SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub const fn nanos(self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 60 * 60 * 1_000_000_000,
            TimeUnit::Days => 24 * 60 * 60 * 1_000_000_000,
        }
    }

    /// Seconds in one unit, fractional below a second.
    pub fn seconds(self) -> f64 {
        self.nanos() as f64 / TimeUnit::Seconds.nanos() as f64
    }

    /// Multiplier that turns a per-second rate into a per-`self` rate.
    pub fn rate_factor(self) -> f64 {
        self.seconds()
    }

    /// Multiplier that turns nanoseconds into `self`.
    pub fn duration_factor(self) -> f64 {
        1.0 / self.nanos() as f64
    }
}

/// Immutable after construction, see [`ReporterBuilder`].
#[derive(Clone)]
pub struct ReporterConfig {
    pub(crate) tags: Tags,
    pub(crate) prefix: String,
    pub(crate) rate_unit: TimeUnit,
    pub(crate) duration_unit: TimeUnit,
    pub(crate) filter: MetricFilter,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ReporterConfig {
    pub fn host(&self) -> &str {
        &self.tags.host
    }

    pub fn environment(&self) -> &str {
        &self.tags.environment
    }

    pub fn component(&self) -> &str {
        &self.tags.component
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    pub fn filter(&self) -> &MetricFilter {
        &self.filter
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.time_millis()
    }
}

impl fmt::Debug for ReporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterConfig")
            .field("tags", &self.tags)
            .field("prefix", &self.prefix)
            .field("rate_unit", &self.rate_unit)
            .field("duration_unit", &self.duration_unit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ReporterConfig`]. Defaults to no prefix, empty environment and
/// component, the system clock, rates per second, durations in milliseconds and no
/// filtering.
pub struct ReporterBuilder {
    clock: Arc<dyn Clock>,
    prefix: Option<String>,
    environment: Option<String>,
    component: Option<String>,
    host: Option<String>,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    filter: MetricFilter,
}

impl Default for ReporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReporterBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            prefix: None,
            environment: None,
            component: None,
            host: None,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            filter: MetricFilter::all(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Prefix all series names, a `.` is appended unless already present.
    pub fn prefixed_with(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Environment label (production, test, development, ...).
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Component label (web, database, agent, ...).
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Skips host name resolution and uses `host` instead.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn convert_rates_to(mut self, rate_unit: TimeUnit) -> Self {
        self.rate_unit = rate_unit;
        self
    }

    pub fn convert_durations_to(mut self, duration_unit: TimeUnit) -> Self {
        self.duration_unit = duration_unit;
        self
    }

    pub fn filter(mut self, filter: MetricFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build_config(self) -> ReporterConfig {
        let host = self.host.unwrap_or_else(resolve_host_name);
        ReporterConfig {
            tags: Tags {
                host,
                environment: self.environment.unwrap_or_default(),
                component: self.component.unwrap_or_default(),
            },
            prefix: normalize_prefix(self.prefix.as_deref()),
            rate_unit: self.rate_unit,
            duration_unit: self.duration_unit,
            filter: self.filter,
            clock: self.clock,
        }
    }
}

pub(crate) fn normalize_prefix(prefix: Option<&str>) -> String {
    match prefix.map(str::trim) {
        None | Some("") => String::new(),
        Some(p) if p.ends_with(PREFIX_SEPARATOR) => p.to_string(),
        Some(p) => format!("{p}{PREFIX_SEPARATOR}"),
    }
}

/// Looks up the local host name once, never fails.
pub fn resolve_host_name() -> String {
    host_or_fallback(local_host_name())
}

fn host_or_fallback(lookup: io::Result<String>) -> String {
    match lookup {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(
                error = %e,
                fallback = UNKNOWN_HOST,
                "Failed to resolve local host name"
            );
            UNKNOWN_HOST.to_string()
        }
    }
}

fn local_host_name() -> io::Result<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for writes of buf.len() bytes and outlives the call
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    parse_host_name(&buf)
}

/// Host name from a NUL-terminated buffer filled by `gethostname`.
fn parse_host_name(buf: &[u8]) -> io::Result<String> {
    let len = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    let name = std::str::from_utf8(&buf[..len])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .trim();
    if name.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "empty host name"));
    }
    Ok(name.to_string())
}
