//! In-memory job store with lazy timeout evaluation and capacity eviction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::JobsConfig;
use crate::error::JobError;
use crate::jobs::clock::{Clock, SystemClock};
use crate::jobs::record::{Job, JobId, JobStatus, JobUpdate, JobView};

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl JobSummary {
    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }
}

/// Message recorded on jobs failed by the timeout check.
pub fn timeout_message(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        let unit = if minutes == 1 { "minute" } else { "minutes" };
        format!("Job timed out after {} {}", minutes, unit)
    } else {
        let unit = if secs == 1 { "second" } else { "seconds" };
        format!("Job timed out after {} {}", secs, unit)
    }
}

/// Shared store of job records.
///
/// The map sits behind a `std::sync::RwLock`. No lock is held across an
/// await point, so the store is safe to share between the request path and
/// any number of background drivers.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    max_jobs: usize,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl JobStore {
    /// Creates a store on the system clock.
    pub fn new(max_jobs: usize, timeout: Duration) -> Self {
        Self::with_clock(max_jobs, timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(max_jobs: usize, timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_jobs,
            timeout,
            clock,
        }
    }

    pub fn from_config(config: &JobsConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(config.max_jobs, config.job_timeout(), clock)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Current time on the store's clock. Anything stamped alongside a job
    /// record should use it.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Allocates a Pending job, evicting old terminal jobs when at capacity.
    pub fn create(&self, job_type: &str) -> JobId {
        let now = self.clock.now();
        let mut jobs = self.write();

        if jobs.len() >= self.max_jobs {
            let evicted = evict_terminal(&mut jobs);
            if evicted > 0 {
                log::info!(
                    "Evicted {} finished jobs ({} remain, cap {})",
                    evicted,
                    jobs.len(),
                    self.max_jobs
                );
            } else {
                log::warn!(
                    "Job store at capacity ({}) with no finished jobs to evict",
                    jobs.len()
                );
            }
        }

        let mut id = JobId::generate();
        while jobs.contains_key(&id) {
            id = JobId::generate();
        }

        jobs.insert(id.clone(), Job::new(id.clone(), job_type, now));
        log::debug!("Created job {} ({})", id, job_type);
        id
    }

    /// Returns the job, failing it first if it has exceeded the timeout.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        let now = self.clock.now();
        {
            let jobs = self.read();
            let job = jobs.get(job_id)?;
            if !job.is_timed_out(now, self.timeout) {
                return Some(job.clone());
            }
        }

        let mut jobs = self.write();
        let job = jobs.get_mut(job_id)?;
        self.expire_if_timed_out(job, now);
        Some(job.clone())
    }

    /// Client projection of [`JobStore::get`].
    pub fn view(&self, job_id: &str) -> Option<JobView> {
        self.get(job_id).map(JobView::from)
    }

    /// Applies an update to a job.
    pub fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), JobError> {
        let now = self.clock.now();
        let mut jobs = self.write();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        job.apply(update, now)
    }

    pub fn start(&self, job_id: &str) -> Result<(), JobError> {
        self.update(job_id, JobUpdate::Start)
    }

    pub fn complete(&self, job_id: &str, result: Value) -> Result<(), JobError> {
        self.update(job_id, JobUpdate::Complete(result))
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) -> Result<(), JobError> {
        self.update(job_id, JobUpdate::Fail(error.into()))
    }

    pub fn record_progress(
        &self,
        job_id: &str,
        processed: usize,
        total: usize,
    ) -> Result<(), JobError> {
        self.update(job_id, JobUpdate::Progress { processed, total })
    }

    /// Per-status counts plus total.
    pub fn summary(&self) -> JobSummary {
        let jobs = self.read();
        let mut summary = JobSummary {
            total: jobs.len(),
            ..Default::default()
        };
        for job in jobs.values() {
            match job.status() {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::Processing => summary.processing += 1,
                JobStatus::Completed => summary.completed += 1,
                JobStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Fails every Processing job past the timeout. Returns the affected ids.
    pub fn expire_timed_out(&self) -> Vec<JobId> {
        let now = self.clock.now();
        let mut jobs = self.write();
        let mut expired: Vec<JobId> = jobs
            .values_mut()
            .filter_map(|job| self.expire_if_timed_out(job, now).then(|| job.id.clone()))
            .collect();
        expired.sort();
        expired
    }

    /// All jobs, newest first.
    pub fn get_all(&self) -> Vec<Job> {
        let jobs = self.read();
        let mut result: Vec<Job> = jobs.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn expire_if_timed_out(&self, job: &mut Job, now: DateTime<Utc>) -> bool {
        if !job.is_timed_out(now, self.timeout) {
            return false;
        }
        log::warn!("Job {} exceeded {:?} in processing", job.id, self.timeout);
        match job.apply(JobUpdate::Fail(timeout_message(self.timeout)), now) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to expire job {}: {}", job.id, e);
                false
            }
        }
    }
}

/// Removes the oldest fifth of finished jobs, by creation time.
fn evict_terminal(jobs: &mut HashMap<JobId, Job>) -> usize {
    let mut terminal: Vec<(DateTime<Utc>, JobId)> = jobs
        .values()
        .filter(|job| job.is_finished())
        .map(|job| (job.created_at, job.id.clone()))
        .collect();
    terminal.sort();

    let to_remove = terminal.len() / 5;
    for (_, id) in terminal.into_iter().take(to_remove) {
        jobs.remove(&id);
    }
    to_remove
}
