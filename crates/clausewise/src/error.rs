use std::path::PathBuf;
use thiserror::Error;

use crate::jobs::JobStatus;

#[derive(Error, Debug)]
pub enum ClausewiseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No analysis provider is configured")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to analysis provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analysis provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse analysis response: {0}")]
    ResponseParse(String),

    #[error("Analysis provider returned an empty response")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove directory '{path}': {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("No files uploaded")]
    NoFiles,

    #[error("File has no filename")]
    MissingFilename,

    #[error("File {filename} is not a supported document type")]
    UnsupportedFile { filename: String },

    #[error("Maximum {max} files allowed per request, got {count}")]
    TooManyFiles { count: usize, max: usize },

    #[error("File {filename} is {size} bytes, limit is {max} bytes")]
    FileTooLarge {
        filename: String,
        size: usize,
        max: usize,
    },

    #[error("AI analysis service unavailable")]
    AnalyzerUnavailable,

    #[error("Failed to stage uploads: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

pub type Result<T> = std::result::Result<T, ClausewiseError>;
