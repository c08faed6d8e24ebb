//! provides logging helpers

use std::fmt;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use influxdb_reporter::transport::log::METRICS_TARGET;
use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::FilterExt;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;

/// Writes the `msg` field of an event and nothing else, so the file holds the encoded
/// batches exactly as they would have been posted.
struct PayloadFormatter;

#[derive(Default)]
struct PayloadVisitor {
    payload: Option<String>,
}

impl Visit for PayloadVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "msg" {
            self.payload = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "msg" {
            self.payload = Some(format!("{:?}", value));
        }
    }
}

impl<S, N> FormatEvent<S, N> for PayloadFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = PayloadVisitor::default();
        event.record(&mut visitor);

        match visitor.payload {
            Some(payload) if !payload.is_empty() => writeln!(writer, "{payload}"),
            _ => Ok(()),
        }
    }
}

fn is_metrics_event(target: &str) -> bool {
    target == METRICS_TARGET
}

/// initiate the global tracing subscriber
///
/// Without `metrics_file` everything goes to stderr. With it, batches written by the log
/// transport are routed to a daily rolling file and kept off stderr; the returned guard
/// flushes that file when dropped.
pub(crate) fn init(metrics_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(metrics_file) = metrics_file else {
        utils::logging::init();
        return Ok(None);
    };

    let dir = metrics_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file = metrics_file
        .file_name()
        .and_then(|f| f.to_str())
        .with_context(|| format!("invalid metrics file name: {}", metrics_file.display()))?;

    let fmt_layer = utils::logging::get_fmt_layer().with_filter(
        utils::logging::env_filter()
            .and(filter::filter_fn(|metadata| !is_metrics_event(metadata.target()))),
    );

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file)
        .max_log_files(3)
        .build(dir)
        .context("failed to create rolling file appender")?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let metrics_layer = layer()
        .event_format(PayloadFormatter)
        .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|metadata| is_metrics_event(metadata.target())));

    registry().with(fmt_layer).with(metrics_layer).init();
    Ok(Some(file_guard))
}
