use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;

use crate::config::schema::ServiceConfig;
use crate::error::ConfigError;

const CONFIG_FILE_NAME: &str = "config.json";

/// Default config location, e.g. `~/.config/clausewise/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clausewise").join(CONFIG_FILE_NAME))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = serde_json::from_str(content)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Loads the given file, the default location if it exists, or built-in defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    if let Some(path) = default_config_path().filter(|p| p.is_file()) {
        log::info!("Loading config from {}", path.display());
        return load_config(path);
    }

    let mut config = ServiceConfig::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn apply_env_overrides(config: &mut ServiceConfig) -> Result<(), ConfigError> {
    if let Some(max_jobs) = parse_env("CLAUSEWISE_MAX_JOBS")? {
        config.jobs.max_jobs = max_jobs;
    }
    if let Some(timeout) = parse_env("CLAUSEWISE_JOB_TIMEOUT")? {
        config.jobs.job_timeout_secs = timeout;
    }
    if let Some(max_file_size) = parse_env("CLAUSEWISE_MAX_FILE_SIZE")? {
        config.uploads.max_file_size = max_file_size;
    }
    if let Some(temp_dir) = env_var("CLAUSEWISE_TEMP_DIR") {
        config.uploads.temp_root = Some(PathBuf::from(temp_dir));
    }
    if let Some(level) = env_var("LOG_LEVEL") {
        config.logging.level = level.to_lowercase();
    }
    if let Some(key) = env_var("GEMINI_API_KEY") {
        config.analysis.api_key = Some(SecretString::from(key));
    }
    Ok(())
}

fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    let fail = |message: &str| {
        Err(ConfigError::Validation {
            message: message.to_string(),
        })
    };

    if config.jobs.max_jobs == 0 {
        return fail("jobs.max_jobs must be greater than 0");
    }
    if config.jobs.job_timeout_secs == 0 {
        return fail("jobs.job_timeout_secs must be greater than 0");
    }
    if config.jobs.sweep_interval_secs == Some(0) {
        return fail("jobs.sweep_interval_secs must be greater than 0 when set");
    }
    if config.uploads.max_files_per_submission == 0 {
        return fail("uploads.max_files_per_submission must be greater than 0");
    }
    if config.uploads.allowed_extensions.is_empty() {
        return fail("uploads.allowed_extensions must not be empty");
    }
    if config
        .uploads
        .allowed_extensions
        .iter()
        .any(|ext| ext.is_empty() || ext.starts_with('.'))
    {
        return fail("uploads.allowed_extensions entries must be bare extensions like \"pdf\"");
    }
    if !(0.0..=2.0).contains(&config.analysis.temperature) {
        return fail("analysis.temperature must be between 0 and 2");
    }
    if !(0.0..=1.0).contains(&config.analysis.top_p) {
        return fail("analysis.top_p must be between 0 and 1");
    }
    if config.analysis.base_url.trim().is_empty() {
        return fail("analysis.base_url must not be empty");
    }

    Ok(())
}
