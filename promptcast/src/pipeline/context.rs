//! Collaborator traits consumed by the pipeline stages.
//!
//! The pipeline never talks to the network or the filesystem directly. Each
//! stage drives one of these traits, which lets tests substitute in-memory
//! fakes and keeps the scheduler independent of any particular service.

use super::error::{GenerationError, PersistenceError, PipelineError, UpscaleError};
use super::job::{ImageId, ImagePayload, Variant};
use super::policy::FailurePolicy;
use super::stages::StageSettings;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of generate workers.
pub const DEFAULT_GENERATE_WORKERS: usize = 5;

/// Default number of upscale workers.
pub const DEFAULT_UPSCALE_WORKERS: usize = 5;

/// Largest accepted worker pool size.
pub const MAX_WORKERS: usize = 64;

/// Default limit on a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for a pipeline run.
///
/// The worker pool sizes double as the capacities of the descriptions and
/// upscale queues, so they cap the number of outstanding requests against
/// each remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Generate workers, and capacity of the descriptions queue
    pub generate_workers: usize,

    /// Upscale workers, and capacity of the upscale queue
    pub upscale_workers: usize,

    /// Limit on a single generation or upscale attempt
    pub request_timeout: Duration,

    /// What workers do when a remote call fails
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate_workers: DEFAULT_GENERATE_WORKERS,
            upscale_workers: DEFAULT_UPSCALE_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate_workers(mut self, workers: usize) -> Self {
        self.generate_workers = workers;
        self
    }

    pub fn with_upscale_workers(mut self, workers: usize) -> Self {
        self.upscale_workers = workers;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Checks that the configuration can run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a worker pool outside
    /// `1..=MAX_WORKERS` or a zero timeout.
    pub fn validate(&self) -> Result<(), PipelineError> {
        check_pool("generate_workers", self.generate_workers)?;
        check_pool("upscale_workers", self.upscale_workers)?;
        if self.request_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "request_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Settings handed to the generate and upscale workers.
    pub fn stage_settings(&self) -> StageSettings {
        StageSettings {
            call_timeout: self.request_timeout,
            policy: self.failure_policy,
        }
    }
}

fn check_pool(key: &str, workers: usize) -> Result<(), PipelineError> {
    if (1..=MAX_WORKERS).contains(&workers) {
        return Ok(());
    }
    Err(PipelineError::InvalidConfig(format!(
        "{} must be between 1 and {}, got {}",
        key, MAX_WORKERS, workers
    )))
}

/// Produces images for a text prompt.
pub trait ImageGenerator: Send + Sync + 'static {
    /// Generates zero or more images for `description`.
    ///
    /// # Returns
    ///
    /// Base64-encoded images on success.
    fn generate(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Vec<ImagePayload>, GenerationError>> + Send;

    /// Returns the generator name for logging.
    fn name(&self) -> &str;
}

/// Produces a higher-resolution copy of an image.
pub trait ImageUpscaler: Send + Sync + 'static {
    /// Upscales a base64-encoded image.
    fn upscale(
        &self,
        image: &ImagePayload,
    ) -> impl Future<Output = Result<ImagePayload, UpscaleError>> + Send;

    /// Returns the upscaler name for logging.
    fn name(&self) -> &str;
}

/// Persists image variants.
///
/// Implementations must create parent directories idempotently and must
/// overwrite rather than duplicate when the same `(folder, id, variant)` is
/// stored twice.
pub trait ImageSink: Send + Sync + 'static {
    /// Stores one variant of an image.
    ///
    /// # Returns
    ///
    /// The location the image was written to.
    fn store(
        &self,
        folder: &str,
        id: ImageId,
        variant: Variant,
        image: &ImagePayload,
    ) -> impl Future<Output = Result<PathBuf, PersistenceError>> + Send;
}
