//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Image generation service
    pub generator: ServiceSettings,
    /// Image upscaling service
    pub upscaler: ServiceSettings,
    /// Worker pools and failure handling
    pub pipeline: PipelineSettings,
    /// Where images are written
    pub output: OutputSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Remote service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Endpoint URL
    pub url: String,
    /// HTTP timeout in seconds
    pub timeout: u64,
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Concurrent generation requests
    pub generate_workers: usize,
    /// Concurrent upscale requests
    pub upscale_workers: usize,
    /// Limit in seconds on one generation or upscale attempt
    pub request_timeout: u64,
    pub failure_policy: PolicyKind,
    /// Retries per call when `failure_policy` is `retry`
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub retry_backoff_ms: u64,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Root of the `{folder}/{id}_{variant}.png` tree
    pub directory: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

/// Failure policy as named in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Drop,
    Retry,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(PolicyKind::Drop),
            "retry" => Ok(PolicyKind::Retry),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Drop => f.write_str("drop"),
            PolicyKind::Retry => f.write_str("retry"),
        }
    }
}
