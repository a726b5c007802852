//! Request-facing operations: submit, poll, summarise, analyse inline.
//!
//! An HTTP layer maps these one to one onto its routes. Submissions return
//! as soon as the uploads are staged and a job exists. The work itself runs
//! on a spawned [`JobDriver`] whose handle is kept until it is awaited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::analysis::{AnalysisReport, Analyzer, GeminiAnalyzer};
use crate::config::{ReportConfig, ServiceConfig, UploadConfig};
use crate::error::SubmitError;
use crate::jobs::{JobDriver, JobId, JobStore, JobSummary, JobView, SystemClock, TimeoutSweeper};
use crate::pipeline::{NoopProgress, Pipeline, WorkUnit};
use crate::processor::{ExtractorRegistry, TextExtractor};
use crate::sanitize;
use crate::storage::TempWorkspace;

/// Job type recorded when the caller does not name one.
pub const DEFAULT_JOB_TYPE: &str = "legal_analysis";

/// One uploaded file as received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: Some(filename.into()),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub ai_enabled: bool,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

pub struct AnalysisService {
    uploads: UploadConfig,
    report_limits: ReportConfig,
    store: Arc<JobStore>,
    /// Absent when no analyzer is configured. Submissions are then refused.
    driver: Option<JobDriver>,
    pipeline: Option<Arc<Pipeline>>,
    handles: Mutex<HashMap<JobId, JoinHandle<()>>>,
    sweeper: Option<TimeoutSweeper>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AnalysisService {
    /// Production constructor. Uses the system clock, the default extractors
    /// and Gemini when an API key is configured.
    pub fn from_config(config: &ServiceConfig) -> crate::Result<Self> {
        let store = Arc::new(JobStore::from_config(&config.jobs, Arc::new(SystemClock)));
        let extractor: Arc<dyn TextExtractor> = Arc::new(ExtractorRegistry::new());
        let analyzer = GeminiAnalyzer::from_config(&config.analysis)?
            .map(|gemini| Arc::new(gemini) as Arc<dyn Analyzer>);

        if analyzer.is_none() {
            warn!("No analysis provider configured, submissions will be refused");
        }

        Ok(Self::new(config, store, extractor, analyzer))
    }

    /// Builds a service around injected collaborators.
    pub fn new(
        config: &ServiceConfig,
        store: Arc<JobStore>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Option<Arc<dyn Analyzer>>,
    ) -> Self {
        let pipeline = analyzer.map(|analyzer| {
            Arc::new(Pipeline::new(
                extractor,
                analyzer,
                config.analysis.min_text_chars,
            ))
        });
        let driver = pipeline.as_ref().map(|pipeline| {
            JobDriver::new(
                Arc::clone(&store),
                Arc::clone(pipeline),
                config.report.clone(),
            )
        });
        let sweeper = config
            .jobs
            .sweep_interval()
            .map(|interval| TimeoutSweeper::new(Arc::clone(&store), interval));

        Self {
            uploads: config.uploads.clone(),
            report_limits: config.report.clone(),
            store,
            driver,
            pipeline,
            handles: Mutex::new(HashMap::new()),
            sweeper,
            sweeper_handle: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn ai_enabled(&self) -> bool {
        self.driver.is_some()
    }

    /// Starts the timeout sweeper when one is configured. Must run inside a
    /// tokio runtime. Calling it again is a no-op.
    pub fn start_sweeper(&self) {
        let Some(sweeper) = &self.sweeper else {
            return;
        };
        let mut slot = lock_recovering(&self.sweeper_handle);
        if slot.is_none() {
            *slot = Some(sweeper.start());
            info!("Timeout sweeper started");
        }
    }

    /// Validates and stages `uploads`, creates a job and starts it in the
    /// background. Returns the new job id straight away.
    pub async fn submit(
        &self,
        job_type: &str,
        uploads: Vec<Upload>,
    ) -> Result<JobId, SubmitError> {
        self.validate(&uploads)?;
        let driver = self.driver.as_ref().ok_or(SubmitError::AnalyzerUnavailable)?;

        let (workspace, units) = self.stage(&uploads).await?;
        let job_id = self.store.create(job_type);
        info!("Job {} submitted with {} file(s)", job_id, units.len());

        let handle = tokio::spawn(driver.clone().run(job_id.clone(), units, workspace));

        let mut handles = self.handles();
        handles.retain(|_, handle| !handle.is_finished());
        handles.insert(job_id.clone(), handle);

        Ok(job_id)
    }

    pub fn get_status(&self, job_id: &str) -> Option<JobView> {
        self.store.view(job_id)
    }

    pub fn list_summary(&self) -> JobSummary {
        self.store.summary()
    }

    /// Waits for the job's driver to finish and returns the final record.
    pub async fn wait(&self, job_id: &str) -> Option<JobView> {
        let handle = self.handles().remove(job_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Driver for job {} did not finish cleanly: {}", job_id, e);
            }
        }
        self.store.view(job_id)
    }

    /// Runs the same per-document pipeline inline and returns the report.
    ///
    /// The report is returned even when no document could be analysed.
    pub async fn analyze_sync(
        &self,
        uploads: Vec<Upload>,
    ) -> Result<AnalysisReport, SubmitError> {
        self.validate(&uploads)?;
        let pipeline = self.pipeline.as_ref().ok_or(SubmitError::AnalyzerUnavailable)?;

        let (workspace, units) = self.stage(&uploads).await?;
        let outcome = pipeline.run(&units, &NoopProgress).await;

        if let Err(e) = workspace.close() {
            warn!("Failed to clean up workspace: {}", e);
        }

        Ok(AnalysisReport::build(
            &outcome.documents,
            &self.report_limits,
            self.store.now(),
        ))
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            ai_enabled: self.ai_enabled(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Stops the sweeper and waits for every outstanding driver.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
        let sweeper_handle = lock_recovering(&self.sweeper_handle).take();
        if let Some(handle) = sweeper_handle {
            if let Err(e) = handle.await {
                warn!("Timeout sweeper did not stop cleanly: {}", e);
            }
        }

        let pending: Vec<JoinHandle<()>> = self.handles().drain().map(|(_, h)| h).collect();
        if !pending.is_empty() {
            info!("Waiting for {} running job(s)", pending.len());
        }
        for result in futures_util::future::join_all(pending).await {
            if let Err(e) = result {
                warn!("Driver did not finish cleanly: {}", e);
            }
        }
    }

    fn validate(&self, uploads: &[Upload]) -> Result<(), SubmitError> {
        if uploads.is_empty() {
            return Err(SubmitError::NoFiles);
        }

        for upload in uploads {
            let filename = upload
                .filename
                .as_deref()
                .and_then(sanitize::safe_file_name)
                .ok_or(SubmitError::MissingFilename)?;
            if !self.uploads.is_allowed(&filename) {
                return Err(SubmitError::UnsupportedFile { filename });
            }
        }

        if uploads.len() > self.uploads.max_files_per_submission {
            return Err(SubmitError::TooManyFiles {
                count: uploads.len(),
                max: self.uploads.max_files_per_submission,
            });
        }

        for upload in uploads {
            if upload.bytes.len() > self.uploads.max_file_size {
                return Err(SubmitError::FileTooLarge {
                    filename: upload.filename.clone().unwrap_or_default(),
                    size: upload.bytes.len(),
                    max: self.uploads.max_file_size,
                });
            }
        }

        Ok(())
    }

    /// Writes the uploads into a fresh workspace. On failure the workspace
    /// is removed before the error is returned.
    async fn stage(&self, uploads: &[Upload]) -> Result<(TempWorkspace, Vec<WorkUnit>), SubmitError> {
        let workspace =
            TempWorkspace::create(&self.uploads.temp_prefix, self.uploads.temp_root.as_deref())?;

        match write_uploads(&workspace, uploads).await {
            Ok(units) => Ok((workspace, units)),
            Err(e) => {
                if let Err(close_err) = workspace.close() {
                    warn!("Failed to clean up workspace: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<JobId, JoinHandle<()>>> {
        lock_recovering(&self.handles)
    }
}

async fn write_uploads(
    workspace: &TempWorkspace,
    uploads: &[Upload],
) -> Result<Vec<WorkUnit>, SubmitError> {
    let mut units = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let filename = upload
            .filename
            .as_deref()
            .and_then(sanitize::safe_file_name)
            .ok_or(SubmitError::MissingFilename)?;
        let path = workspace.store(&filename, &upload.bytes).await?;
        units.push(WorkUnit::new(path, filename));
    }
    Ok(units)
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Service lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Finding;
    use crate::error::AnalysisError;
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl Analyzer for NeverCalled {
        async fn analyze(
            &self,
            _text: &str,
            _label: &str,
        ) -> Result<Vec<Finding>, AnalysisError> {
            Err(AnalysisError::NotConfigured)
        }
    }

    fn service(analyzer: Option<Arc<dyn Analyzer>>) -> AnalysisService {
        let config = ServiceConfig::default();
        let store = Arc::new(JobStore::from_config(&config.jobs, Arc::new(SystemClock)));
        AnalysisService::new(&config, store, Arc::new(ExtractorRegistry::new()), analyzer)
    }

    fn with_analyzer() -> AnalysisService {
        service(Some(Arc::new(NeverCalled)))
    }

    fn pdf(name: &str) -> Upload {
        Upload::new(name, b"%PDF-1.4".to_vec())
    }

    #[test]
    fn test_validate_rejects_empty_submission() {
        assert!(matches!(with_analyzer().validate(&[]), Err(SubmitError::NoFiles)));
    }

    #[test]
    fn test_validate_rejects_missing_or_unsafe_filename() {
        let svc = with_analyzer();
        let nameless = Upload {
            filename: None,
            bytes: vec![1],
        };
        assert!(matches!(svc.validate(&[nameless]), Err(SubmitError::MissingFilename)));
        assert!(matches!(svc.validate(&[pdf("../")]), Err(SubmitError::MissingFilename)));
    }

    #[test]
    fn test_validate_checks_extension_case_insensitively() {
        let svc = with_analyzer();
        assert!(svc.validate(&[pdf("CONTRACT.PDF")]).is_ok());
        match svc.validate(&[pdf("notes.docx")]) {
            Err(SubmitError::UnsupportedFile { filename }) => assert_eq!(filename, "notes.docx"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_validate_file_count_and_size() {
        let svc = with_analyzer();
        let four: Vec<Upload> = (0..4).map(|i| pdf(&format!("{}.pdf", i))).collect();
        assert!(matches!(
            svc.validate(&four),
            Err(SubmitError::TooManyFiles { count: 4, max: 3 })
        ));

        let big = Upload::new("big.pdf", vec![0u8; 50 * 1024 * 1024 + 1]);
        assert!(matches!(svc.validate(&[big]), Err(SubmitError::FileTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_submit_without_analyzer_is_unavailable() {
        let svc = service(None);
        let result = svc.submit(DEFAULT_JOB_TYPE, vec![pdf("a.pdf")]).await;
        assert!(matches!(result, Err(SubmitError::AnalyzerUnavailable)));
        assert!(svc.store().is_empty());
        assert!(!svc.health().ai_enabled);
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_no_job() {
        let svc = with_analyzer();
        let result = svc.submit(DEFAULT_JOB_TYPE, vec![pdf("a.txt")]).await;
        assert!(result.is_err());
        assert_eq!(svc.list_summary().total, 0);
    }

    #[test]
    fn test_health_reports_version() {
        let health = with_analyzer().health();
        assert_eq!(health.status, "healthy");
        assert!(health.ai_enabled);
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }
}
