use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use error_stack::Report;

use super::Transport;
use crate::batch::Batch;
use crate::batch::Series;
use crate::error::ReportError;
use crate::error::ReportResult;

/// Keeps submitted batches in memory.
///
/// Clones share the record of sent batches and the failure budget, so a test can hand one
/// clone to a reporter and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    batch: Batch,
    sent: Arc<Mutex<Vec<Vec<Series>>>>,
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` sends fail with a network error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Batches delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<Series>> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sends attempted, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Transport for MemoryTransport {
    fn batch(&self) -> &Batch {
        &self.batch
    }

    fn batch_mut(&mut self) -> &mut Batch {
        &mut self.batch
    }

    fn submit(&mut self, series: &[Series], _keep_alive: bool) -> ReportResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(Report::new(ReportError::Network {
                message: "injected send failure".into(),
            }));
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(series.to_vec());
        Ok(())
    }
}
