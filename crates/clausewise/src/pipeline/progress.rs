use std::sync::Arc;

use crate::jobs::{JobId, JobStore};

/// Receives a tick after every work unit, whether it succeeded or not.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, processed: usize, total: usize);
}

/// No-op reporter for synchronous analysis and unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _processed: usize, _total: usize) {}
}

/// Writes progress onto a job record in the shared store.
pub struct JobStoreProgress {
    store: Arc<JobStore>,
    job_id: JobId,
}

impl JobStoreProgress {
    pub fn new(store: Arc<JobStore>, job_id: JobId) -> Self {
        Self { store, job_id }
    }
}

impl ProgressReporter for JobStoreProgress {
    fn report(&self, processed: usize, total: usize) {
        if let Err(e) = self.store.record_progress(self.job_id.as_str(), processed, total) {
            log::warn!("Failed to record progress for job {}: {}", self.job_id, e);
        }
    }
}
