//! Periodic reporting on the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::MetricRegistry;
use crate::reporter::CycleOutcome;
use crate::reporter::InfluxdbReporter;
use crate::transport::Transport;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// When a [`ScheduledReporter`] runs cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub period: Duration,
    /// Run one last cycle after cancellation.
    pub report_on_stop: bool,
}

impl Schedule {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            report_on_stop: false,
        }
    }

    pub fn report_on_stop(mut self, report_on_stop: bool) -> Self {
        self.report_on_stop = report_on_stop;
        self
    }
}

/// Background task reporting a registry on a fixed period.
///
/// Cycles run on the blocking pool, one at a time: a tick that arrives while a cycle is
/// still in flight is delayed, never queued up.
pub struct ScheduledReporter {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl ScheduledReporter {
    pub fn spawn<T>(
        reporter: Arc<InfluxdbReporter<T>>,
        registry: Arc<MetricRegistry>,
        schedule: Schedule,
        token: CancellationToken,
    ) -> Self
    where
        T: Transport + 'static,
    {
        let period = schedule.period.max(MIN_PERIOD);
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(period = ?period, "Starting scheduled reporter");

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        if schedule.report_on_stop {
                            run_cycle(&reporter, &registry).await;
                        }
                        break;
                    }
                    _ = interval.tick() => {
                        run_cycle(&reporter, &registry).await;
                    }
                }
            }

            tracing::info!("Scheduled reporter stopped");
        });

        Self { handle, token }
    }

    /// Cancels the task and waits for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        self.join().await;
    }

    /// Waits for the task to finish without cancelling it.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!("Scheduled reporter task failed: {e}");
        }
    }
}

async fn run_cycle<T>(reporter: &Arc<InfluxdbReporter<T>>, registry: &Arc<MetricRegistry>)
where
    T: Transport + 'static,
{
    let reporter = Arc::clone(reporter);
    let registry = Arc::clone(registry);
    match tokio::task::spawn_blocking(move || reporter.report_now(&registry)).await {
        Ok(CycleOutcome::Sent { series }) => tracing::trace!(series, "Scheduled cycle sent"),
        Ok(CycleOutcome::Failed) => {}
        Err(e) => tracing::error!("Reporting cycle panicked: {e}"),
    }
}
