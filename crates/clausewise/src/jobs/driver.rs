//! Background execution of one analysis job.
//!
//! The driver moves a job Pending -> Processing, feeds its units through the
//! [`Pipeline`], and always leaves the job terminal: Completed with the
//! report, or Failed with a message. A unit whose extractor or analyzer
//! panics is skipped by the pipeline. Any other panic is caught at the task
//! boundary and recorded as a failure. The staging workspace is removed
//! exactly once, after the job reaches its terminal state.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::analysis::AnalysisReport;
use crate::config::ReportConfig;
use crate::error::JobError;
use crate::jobs::record::JobId;
use crate::jobs::store::JobStore;
use crate::pipeline::error::panic_message;
use crate::pipeline::{JobStoreProgress, Pipeline, WorkUnit};
use crate::storage::TempWorkspace;

/// Recorded when every unit of a job was skipped.
pub const NOTHING_ANALYZED_MESSAGE: &str = "No documents could be analyzed";

#[derive(Error, Debug)]
enum DriveError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("{}", NOTHING_ANALYZED_MESSAGE)]
    NothingAnalyzed,
}

/// Runs jobs against a shared store. Cheap to clone.
#[derive(Clone)]
pub struct JobDriver {
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    report_limits: Arc<ReportConfig>,
}

impl JobDriver {
    pub fn new(store: Arc<JobStore>, pipeline: Arc<Pipeline>, report_limits: ReportConfig) -> Self {
        Self {
            store,
            pipeline,
            report_limits: Arc::new(report_limits),
        }
    }

    /// Drives `job_id` to a terminal state, then removes `workspace`.
    ///
    /// Never returns an error. Everything that goes wrong ends up on the job.
    pub async fn run(self, job_id: JobId, units: Vec<WorkUnit>, workspace: TempWorkspace) {
        let span = info_span!("job", job_id = %job_id, units = units.len());

        async move {
            let work = tokio::spawn(drive(
                Arc::clone(&self.store),
                Arc::clone(&self.pipeline),
                Arc::clone(&self.report_limits),
                job_id.clone(),
                units,
            ));

            let finish = match work.await {
                Ok(Ok(report)) => {
                    info!("Job completed");
                    self.store.complete(job_id.as_str(), report)
                }
                Ok(Err(e)) => {
                    warn!("Job failed: {}", e);
                    self.store.fail(job_id.as_str(), e.to_string())
                }
                Err(join_err) => {
                    let message = task_failure_message(join_err);
                    warn!("Job task aborted: {}", message);
                    self.store.fail(job_id.as_str(), message)
                }
            };

            // Rejected when the job was already timed out while running.
            if let Err(e) = finish {
                warn!("Could not record outcome: {}", e);
            }

            if let Err(e) = workspace.close() {
                warn!("Failed to clean up workspace: {}", e);
            }
        }
        .instrument(span)
        .await
    }
}

async fn drive(
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    report_limits: Arc<ReportConfig>,
    job_id: JobId,
    units: Vec<WorkUnit>,
) -> Result<Value, DriveError> {
    store.start(job_id.as_str())?;
    store.record_progress(job_id.as_str(), 0, units.len())?;

    let progress = JobStoreProgress::new(Arc::clone(&store), job_id);
    let outcome = pipeline.run(&units, &progress).await;

    if outcome.documents.is_empty() {
        return Err(DriveError::NothingAnalyzed);
    }
    if !outcome.warnings.is_empty() {
        info!(
            "{} of {} documents skipped",
            outcome.warnings.len(),
            units.len()
        );
    }

    let report = AnalysisReport::build(&outcome.documents, &report_limits, store.now());
    Ok(report.to_value())
}

fn task_failure_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => format!(
            "Job processing failed unexpectedly: {}",
            panic_message(&*payload)
        ),
        Err(_) => "Job was cancelled".to_string(),
    }
}
