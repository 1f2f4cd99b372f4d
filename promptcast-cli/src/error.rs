//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use promptcast::config::ConfigFileError;
use promptcast::pipeline::PipelineError;
use promptcast::provider::ProviderError;
use std::fmt;
use std::path::PathBuf;
use std::process;

/// Exit code used when the run was interrupted with Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Missing or unusable command-line input
    Input(String),
    /// Failed to read an input list file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Failed to create an HTTP client
    HttpClient(ProviderError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// The pipeline refused to run
    Pipeline(PipelineError),
    /// The run was stopped before it finished
    Interrupted,
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Input(_) => {
                eprintln!();
                eprintln!("Provide prompts with --phrase/--suffix (repeatable) or");
                eprintln!("--phrases-file/--suffixes-file (one entry per line).");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the file shown by 'promptcast config path', or");
                eprintln!("recreate it with 'promptcast config init --force'.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Interrupted => EXIT_INTERRUPTED,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            CliError::Interrupted => write!(f, "Interrupted before all images were stored"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::FileRead { error, .. } => Some(error),
            CliError::HttpClient(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::HttpClient(e)
    }
}
