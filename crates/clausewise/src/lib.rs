pub mod analysis;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod service;
pub mod storage;

pub use analysis::{AnalysisReport, Analyzer, Finding, GeminiAnalyzer, RiskLevel};
pub use config::{load_config, load_config_or_default, ServiceConfig};
pub use error::{
    AnalysisError, ClausewiseError, ConfigError, JobError, ProcessError, Result, StorageError,
    SubmitError,
};
pub use jobs::{Job, JobDriver, JobId, JobStatus, JobStore, JobSummary, JobView, TimeoutSweeper};
pub use logging::init_logging;
pub use pipeline::{Pipeline, WorkUnit};
pub use processor::{ExtractorRegistry, TextExtractor};
pub use service::{AnalysisService, HealthStatus, Upload};
pub use storage::TempWorkspace;
