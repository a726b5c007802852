//! Job records and the lifecycle state machine.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;

/// Length of a job identifier in hex characters.
pub const JOB_ID_LEN: usize = 8;

/// Short job identifier handed to clients for polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generates a fresh identifier from the leading characters of a v4 UUID.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(JOB_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Externally visible status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Returns true for Completed and Failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Terminal states own their payload, so a record can
/// never carry both a result and an error.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Processing,
    Completed { result: Value },
    Failed { error: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A requested change to a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Pending -> Processing.
    Start,
    /// Processing -> Completed.
    Complete(Value),
    /// Processing -> Failed.
    Fail(String),
    /// Sets the unit counters and recomputes the percentage. Only live jobs
    /// accept it.
    Progress { processed: usize, total: usize },
}

/// One tracked unit of asynchronous work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: u8,
    pub processed_files: usize,
    pub total_files: usize,
}

impl Job {
    /// Creates a Pending job with zero progress.
    pub fn new(id: JobId, job_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            state: JobState::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            progress: 0,
            processed_files: 0,
            total_files: 0,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Returns true if this job is finished (completed or failed).
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.state {
            JobState::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Applies an update, enforcing forward-only transitions.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) -> Result<(), JobError> {
        let from = self.status();
        match (from, update) {
            (
                JobStatus::Pending | JobStatus::Processing,
                JobUpdate::Progress { processed, total },
            ) => {
                self.record_progress(processed, total);
                Ok(())
            }
            (JobStatus::Pending, JobUpdate::Start) => {
                self.state = JobState::Processing;
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                }
                Ok(())
            }
            (JobStatus::Processing, JobUpdate::Complete(result)) => {
                self.finish(JobState::Completed { result }, now);
                Ok(())
            }
            (JobStatus::Processing, JobUpdate::Fail(error)) => {
                self.finish(JobState::Failed { error }, now);
                Ok(())
            }
            (from, update) => Err(JobError::InvalidTransition {
                job_id: self.id.to_string(),
                from,
                to: target_status(&update),
            }),
        }
    }

    /// Returns true if the job has spent longer than `timeout` in Processing.
    pub fn is_timed_out(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
        if self.status() != JobStatus::Processing {
            return false;
        }
        let Some(started_at) = self.started_at else {
            return false;
        };
        match (now - started_at).to_std() {
            Ok(elapsed) => elapsed > timeout,
            // Clock moved backwards relative to the start.
            Err(_) => false,
        }
    }

    fn record_progress(&mut self, processed: usize, total: usize) {
        let processed = if total > 0 && processed > total {
            log::warn!(
                "Job {} reported {} of {} units processed, clamping",
                self.id,
                processed,
                total
            );
            total
        } else {
            processed
        };
        self.processed_files = processed;
        self.total_files = total;
        self.progress = super::progress::percent(processed, total);
    }

    fn finish(&mut self, state: JobState, now: DateTime<Utc>) {
        self.state = state;
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }
}

fn target_status(update: &JobUpdate) -> JobStatus {
    match update {
        JobUpdate::Start => JobStatus::Processing,
        JobUpdate::Complete(_) => JobStatus::Completed,
        JobUpdate::Fail(_) => JobStatus::Failed,
        JobUpdate::Progress { .. } => JobStatus::Processing,
    }
}

/// Client projection of a job, as returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: u8,
    pub processed_files: usize,
    pub total_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            job_type: job.job_type.clone(),
            status: job.status(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            progress: job.progress,
            processed_files: job.processed_files,
            total_files: job.total_files,
            result: job.result().cloned(),
            error: job.error().map(str::to_string),
        }
    }
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        JobView::from(&job)
    }
}
