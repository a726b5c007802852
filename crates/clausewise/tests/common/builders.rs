//! Builders for test configurations and upload fixtures.

#![allow(dead_code)]

use std::path::Path;

use clausewise::config::ServiceConfig;
use clausewise::Upload;

/// Builder for creating `ServiceConfig` instances.
pub struct ConfigBuilder {
    config: ServiceConfig,
}

impl ConfigBuilder {
    /// Defaults, with workspaces created under `temp_root`.
    pub fn new(temp_root: &Path) -> Self {
        let mut config = ServiceConfig::default();
        config.uploads.temp_root = Some(temp_root.to_path_buf());
        Self { config }
    }

    pub fn max_jobs(mut self, max_jobs: usize) -> Self {
        self.config.jobs.max_jobs = max_jobs;
        self
    }

    pub fn job_timeout_secs(mut self, secs: u64) -> Self {
        self.config.jobs.job_timeout_secs = secs;
        self
    }

    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.jobs.sweep_interval_secs = Some(secs);
        self
    }

    pub fn max_files(mut self, max: usize) -> Self {
        self.config.uploads.max_files_per_submission = max;
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.uploads.max_file_size = bytes;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

/// A contract body long enough to pass the minimum-text check.
pub fn contract_text(title: &str) -> String {
    format!(
        "{}\n\n1. Termination. Either party may terminate this agreement with thirty days notice.\n\
         2. Liability. The supplier's liability is limited to the fees paid in the prior year.",
        title
    )
}

pub fn contract_upload(filename: &str) -> Upload {
    Upload::new(filename, contract_text(filename).into_bytes())
}

/// An upload the stub analyzer rejects.
pub fn failing_upload(filename: &str) -> Upload {
    let text = format!("{} FAIL_ANALYSIS", contract_text(filename));
    Upload::new(filename, text.into_bytes())
}

/// An upload with too little text to analyse.
pub fn blank_upload(filename: &str) -> Upload {
    Upload::new(filename, b"   ".to_vec())
}
