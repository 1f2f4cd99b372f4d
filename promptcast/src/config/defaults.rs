//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::settings::*;
use crate::pipeline::{
    DEFAULT_GENERATE_WORKERS, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BACKOFF, DEFAULT_UPSCALE_WORKERS,
};
use crate::provider::{DALLEMINI_DEFAULT_URL, DEFAULT_HTTP_TIMEOUT, ZYRO_DEFAULT_URL};
use crate::storage::DEFAULT_RESULTS_DIR;
use std::path::PathBuf;

pub use crate::pipeline::MAX_WORKERS;

/// Default HTTP timeout in seconds for both services.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = DEFAULT_HTTP_TIMEOUT.as_secs();

/// Default limit in seconds on one generation or upscale attempt.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = DEFAULT_REQUEST_TIMEOUT.as_secs();

/// Default retries per call when retrying is enabled.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = DEFAULT_RETRY_BACKOFF.as_millis() as u64;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            generator: ServiceSettings {
                url: DALLEMINI_DEFAULT_URL.to_string(),
                timeout: DEFAULT_SERVICE_TIMEOUT_SECS,
            },
            upscaler: ServiceSettings {
                url: ZYRO_DEFAULT_URL.to_string(),
                timeout: DEFAULT_SERVICE_TIMEOUT_SECS,
            },
            pipeline: PipelineSettings {
                generate_workers: DEFAULT_GENERATE_WORKERS,
                upscale_workers: DEFAULT_UPSCALE_WORKERS,
                request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
                failure_policy: PolicyKind::Drop,
                max_retries: DEFAULT_MAX_RETRIES,
                retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            },
            output: OutputSettings {
                directory: PathBuf::from(DEFAULT_RESULTS_DIR),
            },
            logging: LoggingSettings {
                file: crate::logging::default_log_dir().join(crate::logging::default_log_file()),
            },
        }
    }
}
