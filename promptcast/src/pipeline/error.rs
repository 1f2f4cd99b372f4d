//! Error types for the pipeline.
//!
//! Errors are split by stage. Stage errors are per-item: a worker logs them,
//! drops the item and moves on. Only [`PipelineError`] is returned from a run,
//! and only for problems detected before any work starts.

use crate::provider::ProviderError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Common behaviour of stage errors used by the failure policy.
pub trait StageFailure: std::error::Error + Send + 'static {
    /// Builds the error reported when a call exceeds its time limit.
    fn timed_out(after: Duration) -> Self;

    /// Whether trying the same call again could succeed.
    fn is_retryable(&self) -> bool;
}

/// Image generation failed for one description.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport-level failure talking to the generator
    #[error("generation request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The generator answered with something other than a list of images
    #[error("unexpected generation response: {0}")]
    InvalidResponse(String),

    /// The call did not finish in time
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

impl StageFailure for GenerationError {
    fn timed_out(after: Duration) -> Self {
        GenerationError::Timeout(after)
    }

    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Provider(e) => e.is_retryable(),
            GenerationError::InvalidResponse(_) => false,
            GenerationError::Timeout(_) => true,
        }
    }
}

/// Upscaling failed for one image.
#[derive(Debug, Error)]
pub enum UpscaleError {
    /// Transport-level failure talking to the upscaler
    #[error("upscale request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The upscaler answered without a usable image
    #[error("unexpected upscale response: {0}")]
    InvalidResponse(String),

    /// The call did not finish in time
    #[error("upscale timed out after {0:?}")]
    Timeout(Duration),
}

impl StageFailure for UpscaleError {
    fn timed_out(after: Duration) -> Self {
        UpscaleError::Timeout(after)
    }

    fn is_retryable(&self) -> bool {
        match self {
            UpscaleError::Provider(e) => e.is_retryable(),
            UpscaleError::InvalidResponse(_) => false,
            UpscaleError::Timeout(_) => true,
        }
    }
}

/// Writing one image variant to disk failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Payload was not valid base64
    #[error("base64 decode failed: {0}")]
    Decode(String),

    /// Payload decoded but is not a readable image, or PNG encoding failed
    #[error("image conversion failed: {0}")]
    Image(String),

    /// Filesystem error
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Blocking conversion task panicked
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// Queue operation could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed or the run is shutting down
    #[error("queue is shut down")]
    Shutdown,

    /// `task_done` was called more times than items were put
    #[error("task_done called too many times on queue '{label}'")]
    TooManyAcknowledgements { label: String },
}

/// Run-level errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration cannot produce a working pipeline
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Timeout(Duration::from_secs(30));
        assert_eq!(format!("{}", err), "generation timed out after 30s");

        let err = GenerationError::InvalidResponse("missing 'images'".to_string());
        assert_eq!(
            format!("{}", err),
            "unexpected generation response: missing 'images'"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(GenerationError::timed_out(Duration::from_secs(1)).is_retryable());
        assert!(GenerationError::from(ProviderError::HttpError("reset".into())).is_retryable());
        assert!(!GenerationError::InvalidResponse("bad".into()).is_retryable());

        assert!(UpscaleError::timed_out(Duration::from_secs(1)).is_retryable());
        assert!(!UpscaleError::InvalidResponse("bad".into()).is_retryable());
        assert!(!UpscaleError::from(ProviderError::InvalidResponse("x".into())).is_retryable());
    }

    #[test]
    fn test_persistence_error_display_includes_path() {
        let err = PersistenceError::Io {
            path: PathBuf::from("results/cat/x_small.png"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            format!("{}", err),
            "I/O error at results/cat/x_small.png: denied"
        );
    }

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::TooManyAcknowledgements {
            label: "upscale".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "task_done called too many times on queue 'upscale'"
        );
    }
}
