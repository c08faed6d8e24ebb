use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use influxdb_reporter::TimeUnit;
use influxdb_reporter::WireFormat;
use utils::version;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn reporter_args(&self) -> &ReporterArgs {
        match &self.command {
            Commands::Run(args) => &args.reporter,
            Commands::Once(args) => args,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report process metrics periodically until interrupted
    Run(RunArgs),
    /// Run a single reporting cycle and exit
    Once(ReporterArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// POST batches to InfluxDB
    Http,
    /// Write batches to the metrics log file
    Log,
}

#[derive(Args, Debug, Clone)]
pub struct ReporterArgs {
    #[arg(
        long,
        env = "INFLUXDB_URL",
        default_value = "http://localhost:8086",
        help = "Base URL of the InfluxDB server"
    )]
    pub url: String,

    #[arg(long, env = "INFLUXDB_DATABASE", default_value = "metrics")]
    pub database: String,

    #[arg(long, env = "INFLUXDB_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "INFLUXDB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, value_enum, default_value = "json", help = "Body format of write requests")]
    pub format: WireFormat,

    #[arg(long, value_enum, default_value = "http")]
    pub transport: TransportKind,

    #[arg(
        long,
        default_value = "5000",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "HTTP request timeout in milliseconds"
    )]
    pub timeout_ms: u64,

    #[arg(long, env = "REPORTER_PREFIX", help = "Prefix prepended to every series name")]
    pub prefix: Option<String>,

    #[arg(long, env = "REPORTER_ENVIRONMENT")]
    pub environment: Option<String>,

    #[arg(long, env = "REPORTER_COMPONENT")]
    pub component: Option<String>,

    #[arg(
        long,
        env = "REPORTER_HOST",
        help = "Host tag, defaults to the local host name"
    )]
    pub host: Option<String>,

    #[arg(long, value_enum, default_value = "seconds")]
    pub rate_unit: TimeUnit,

    #[arg(long, value_enum, default_value = "milliseconds")]
    pub duration_unit: TimeUnit,

    #[arg(long, help = "Only report metrics whose name starts with this prefix")]
    pub only: Option<String>,

    #[arg(
        long,
        env = "METRICS_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Rolling file receiving batches of the log transport, e.g. logs/metrics.log"
    )]
    pub metrics_file: Option<PathBuf>,
}

impl ReporterArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub reporter: ReporterArgs,

    #[arg(
        long,
        env = "REPORTER_PERIOD_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between reporting cycles"
    )]
    pub period_secs: u64,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Report once more when shutting down"
    )]
    pub report_on_stop: bool,
}

impl RunArgs {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["influxdb-reporter", "run"]).unwrap();
        let Commands::Run(args) = &cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.period(), Duration::from_secs(10));
        assert!(args.report_on_stop);

        let reporter = cli.reporter_args();
        assert_eq!(reporter.format, WireFormat::Json);
        assert_eq!(reporter.transport, TransportKind::Http);
        assert_eq!(reporter.rate_unit, TimeUnit::Seconds);
        assert_eq!(reporter.duration_unit, TimeUnit::Milliseconds);
        assert_eq!(reporter.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn once_with_options() {
        let cli = Cli::try_parse_from([
            "influxdb-reporter",
            "once",
            "--url",
            "http://influx:8086",
            "--database",
            "app",
            "--format",
            "line",
            "--prefix",
            "svc",
            "--rate-unit",
            "minutes",
        ])
        .unwrap();

        let reporter = cli.reporter_args();
        assert_eq!(reporter.url, "http://influx:8086");
        assert_eq!(reporter.database, "app");
        assert_eq!(reporter.format, WireFormat::Line);
        assert_eq!(reporter.prefix.as_deref(), Some("svc"));
        assert_eq!(reporter.rate_unit, TimeUnit::Minutes);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(Cli::try_parse_from(["influxdb-reporter", "run", "--period-secs", "0"]).is_err());
    }
}
