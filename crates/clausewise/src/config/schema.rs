use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Soft cap on stored jobs before terminal jobs are evicted.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    /// Seconds a job may spend in Processing before it is failed.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// Interval for the background timeout sweep. Disabled when unset.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

fn default_max_jobs() -> usize {
    100
}

fn default_job_timeout_secs() -> u64 {
    300
}

impl JobsConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            job_timeout_secs: default_job_timeout_secs(),
            sweep_interval_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_files")]
    pub max_files_per_submission: usize,
    /// Per-file limit in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Lowercase extensions without the leading dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Parent directory for per-submission workspaces. System temp when unset.
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
}

fn default_max_files() -> usize {
    3
}

fn default_max_file_size() -> usize {
    50 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_temp_prefix() -> String {
    "legal_analysis_".to_string()
}

impl UploadConfig {
    /// Case-insensitive extension check.
    pub fn is_allowed(&self, filename: &str) -> bool {
        let Some(ext) = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
        else {
            return false;
        };
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files_per_submission: default_max_files(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
            temp_prefix: default_temp_prefix(),
            temp_root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Units whose trimmed text is shorter than this are skipped.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Cap on findings recovered from free-text responses.
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
    /// Read from `GEMINI_API_KEY`, never from or to the config file.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

fn default_min_text_chars() -> usize {
    50
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.8
}

fn default_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_findings() -> usize {
    10
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_text_chars: default_min_text_chars(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_findings: default_max_findings(),
            api_key: None,
        }
    }
}

/// Size limits applied when findings are copied into a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_max_clauses")]
    pub max_clauses_per_doc: usize,
    #[serde(default = "default_clause_chars")]
    pub clause_chars: usize,
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
    #[serde(default = "default_laws_chars")]
    pub laws_chars: usize,
}

fn default_max_clauses() -> usize {
    10
}

fn default_clause_chars() -> usize {
    500
}

fn default_summary_chars() -> usize {
    300
}

fn default_laws_chars() -> usize {
    200
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_clauses_per_doc: default_max_clauses(),
            clause_chars: default_clause_chars(),
            summary_chars: default_summary_chars(),
            laws_chars: default_laws_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
