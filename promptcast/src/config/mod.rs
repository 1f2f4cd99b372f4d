//! Configuration for promptcast.
//!
//! User settings live in `~/.promptcast/config.ini`. A missing file, section
//! or key falls back to the defaults, so an empty file is a valid
//! configuration.
//!
//! # Example
//!
//! ```ignore
//! use promptcast::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let pipeline_config = config.pipeline_config();
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_SERVICE_TIMEOUT_SECS, MAX_WORKERS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, LoggingSettings, OutputSettings, PipelineSettings, PolicyKind, ServiceSettings,
};
