//! Test harness for isolated service tests.
//!
//! The `TestHarness` owns:
//! - A temp directory that receives every submission workspace
//! - A `ManualClock` shared with the job store
//! - A stub extractor that reads uploads as UTF-8
//! - A stub analyzer that can be gated to hold jobs mid-flight

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::Semaphore;

use clausewise::analysis::{Analyzer, Confidence, Finding, RiskLevel};
use clausewise::config::ServiceConfig;
use clausewise::error::{AnalysisError, ProcessError};
use clausewise::jobs::{JobStatus, JobStore, JobView, ManualClock};
use clausewise::processor::{DocumentFormat, TextExtractor};
use clausewise::AnalysisService;

use super::builders::ConfigBuilder;

/// Marker that makes the stub analyzer fail a document.
pub const FAIL_MARKER: &str = "FAIL_ANALYSIS";

/// Reads any file as UTF-8 text.
pub struct Utf8Extractor;

impl TextExtractor for Utf8Extractor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn supports(&self, _format: DocumentFormat) -> bool {
        true
    }
}

/// Returns two findings per document, or an error when the text carries
/// [`FAIL_MARKER`]. When gated, each call waits for one permit.
pub struct StubAnalyzer {
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self {
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, text: &str, _label: &str) -> Result<Vec<Finding>, AnalysisError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if text.contains(FAIL_MARKER) {
            return Err(AnalysisError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            });
        }

        let finding = |clause: &str, risk| Finding {
            clause: clause.to_string(),
            risk,
            laws: "Contract law".to_string(),
            summary: format!("Review the {} clause", clause.to_lowercase()),
            confidence: Confidence::High,
            analyzed_at: Utc::now(),
        };
        Ok(vec![
            finding("Termination", RiskLevel::High),
            finding("Liability", RiskLevel::Medium),
        ])
    }
}

/// Isolated environment around one `AnalysisService`.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Parent of every submission workspace.
    pub workspace_root: PathBuf,
    pub clock: Arc<ManualClock>,
    pub store: Arc<JobStore>,
    pub analyzer: Arc<StubAnalyzer>,
    /// Permits for a gated analyzer. Unused when ungated.
    pub gate: Arc<Semaphore>,
    pub service: AnalysisService,
}

impl TestHarness {
    /// Harness with default configuration and an ungated analyzer.
    pub fn new() -> Self {
        Self::build(|builder| builder, false)
    }

    /// Harness whose analyzer blocks until permits are released.
    pub fn gated() -> Self {
        Self::build(|builder| builder, true)
    }

    pub fn with_config(configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        Self::build(configure, false)
    }

    pub fn gated_with_config(configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        Self::build(configure, true)
    }

    fn build(configure: impl FnOnce(ConfigBuilder) -> ConfigBuilder, gated: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let workspace_root = temp_dir.path().join("workspaces");
        std::fs::create_dir_all(&workspace_root).expect("Failed to create workspace root");

        let config: ServiceConfig = configure(ConfigBuilder::new(&workspace_root)).build();

        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(JobStore::from_config(&config.jobs, clock.clone()));
        let gate = Arc::new(Semaphore::new(0));
        let analyzer = Arc::new(if gated {
            StubAnalyzer::gated(Arc::clone(&gate))
        } else {
            StubAnalyzer::new()
        });

        let service = AnalysisService::new(
            &config,
            Arc::clone(&store),
            Arc::new(Utf8Extractor),
            Some(analyzer.clone() as Arc<dyn Analyzer>),
        );

        Self {
            temp_dir,
            workspace_root,
            clock,
            store,
            analyzer,
            gate,
            service,
        }
    }

    /// Lets `n` more analyzer calls through.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Number of workspaces still on disk.
    pub fn workspace_count(&self) -> usize {
        std::fs::read_dir(&self.workspace_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Status as stored, without triggering the lazy timeout check.
    pub fn raw_status(&self, job_id: &str) -> Option<JobStatus> {
        self.store
            .get_all()
            .into_iter()
            .find(|job| job.id.as_str() == job_id)
            .map(|job| job.status())
    }

    /// Polls the job until `predicate` holds, panicking after a few seconds.
    pub async fn wait_until(&self, job_id: &str, predicate: impl Fn(&JobView) -> bool) -> JobView {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(view) = self.service.get_status(job_id) {
                if predicate(&view) {
                    return view;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "condition not reached for job {}: {:?}",
                    job_id,
                    self.service.get_status(job_id)
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
