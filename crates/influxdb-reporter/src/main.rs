mod cli;
mod logging;

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use influxdb_reporter::transport::HttpConfig;
use influxdb_reporter::transport::HttpTransport;
use influxdb_reporter::transport::LogTransport;
use influxdb_reporter::CycleOutcome;
use influxdb_reporter::FieldValue;
use influxdb_reporter::InfluxdbReporter;
use influxdb_reporter::MetricFilter;
use influxdb_reporter::MetricRegistry;
use influxdb_reporter::ReporterBuilder;
use influxdb_reporter::Schedule;
use influxdb_reporter::ScheduledReporter;
use influxdb_reporter::Transport;
use tokio_util::sync::CancellationToken;
use utils::version;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::ReporterArgs;
use crate::cli::RunArgs;
use crate::cli::TransportKind;

type Reporter = InfluxdbReporter<Box<dyn Transport>>;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init(cli.reporter_args().metrics_file.as_deref())?;

    tracing::info!("Starting influxdb-reporter {}", &**version::VERSION);

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Once(args) => once(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let reporter = Arc::new(build_reporter(&args.reporter)?);
    let registry = Arc::new(process_registry(&reporter)?);

    let token = CancellationToken::new();
    let schedule = Schedule::every(args.period()).report_on_stop(args.report_on_stop);
    let scheduled = ScheduledReporter::spawn(reporter, registry, schedule, token.clone());

    wait_for_shutdown_signal().await?;
    tracing::info!("Shutdown signal received, stopping reporter");
    token.cancel();

    let timeout = Duration::from_secs(30);
    tokio::time::timeout(timeout, scheduled.join())
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Reporter shutdown timed out after {:?}", timeout);
        });

    Ok(())
}

async fn once(args: ReporterArgs) -> Result<()> {
    let reporter = build_reporter(&args)?;
    let registry = process_registry(&reporter)?;

    let outcome = tokio::task::spawn_blocking(move || reporter.report_now(&registry)).await?;
    match outcome {
        CycleOutcome::Sent { series } => {
            tracing::info!(series, "Reported metrics");
            Ok(())
        }
        CycleOutcome::Failed => Err(anyhow::anyhow!("reporting cycle failed")),
    }
}

fn build_reporter(args: &ReporterArgs) -> Result<Reporter> {
    let transport: Box<dyn Transport> = match args.transport {
        TransportKind::Http => {
            let mut config = HttpConfig::new(&args.url, &args.database)
                .with_format(args.format)
                .with_timeout(args.timeout());
            if let Some(username) = &args.username {
                let password = args.password.as_deref().unwrap_or_default();
                config = config.with_credentials(username, password);
            }
            let transport = HttpTransport::new(config).map_err(|e| anyhow::anyhow!("{e:?}"))?;
            Box::new(transport)
        }
        TransportKind::Log => {
            if args.metrics_file.is_none() {
                tracing::warn!("Log transport without --metrics-file, batches go to stderr");
            }
            Box::new(LogTransport::new(args.format))
        }
    };

    let mut builder = ReporterBuilder::new()
        .convert_rates_to(args.rate_unit)
        .convert_durations_to(args.duration_unit);
    if let Some(prefix) = &args.prefix {
        builder = builder.prefixed_with(prefix);
    }
    if let Some(environment) = &args.environment {
        builder = builder.with_environment(environment);
    }
    if let Some(component) = &args.component {
        builder = builder.with_component(component);
    }
    if let Some(host) = &args.host {
        builder = builder.with_host(host);
    }
    if let Some(only) = &args.only {
        builder = builder.filter(MetricFilter::starts_with(only));
    }

    Ok(builder.build(transport))
}

/// Metrics describing this process and the reporter itself.
fn process_registry(reporter: &Reporter) -> Result<MetricRegistry> {
    let registry = MetricRegistry::new();
    let started = Instant::now();

    registry
        .register_gauge("process.uptime", move || {
            FieldValue::Float(started.elapsed().as_secs_f64())
        })
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    registry
        .register_gauge("process.pid", || {
            FieldValue::UnsignedInteger(u64::from(std::process::id()))
        })
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    reporter
        .stats()
        .register_into(&registry, "reporter.")
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    Ok(registry)
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }
    Ok(())
}
