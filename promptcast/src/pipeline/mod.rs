//! Concurrent image production pipeline.
//!
//! This module implements a three-stage pipeline that turns text prompts into
//! stored image files. Two stages call rate-sensitive remote services, so the
//! pipeline is built around bounded queues that cap the number of outstanding
//! requests against each service.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────┐  small   ┌────────────┐
//! descriptions ────► │ generate x N │ ───────► │            │
//!  (bounded N)       └──────┬───────┘          │            │
//!                           │ image            │   stores   │ ──► store x 1 ──► disk
//!                           ▼                  │ (unbounded)│
//!   upscales (bounded M) ─► upscale x M ─────► │            │
//!                                      big     └────────────┘
//! ```
//!
//! Every generated image gets a fresh [`ImageId`] and is stored twice under
//! the same id: once as generated (`small`) and once upscaled (`big`). An
//! upscale failure only loses the big variant.
//!
//! # Failure Isolation
//!
//! Failures are handled per item. A worker logs the failure, drops the item,
//! acknowledges it and moves on. Runs never fail because of a single item.
//!
//! # Key Components
//!
//! - [`WorkQueue`] - FIFO queue with put/get/task_done/join semantics
//! - [`Pipeline`] - Wires worker pools onto the queues and runs a batch
//! - [`FailurePolicy`] - Drop or retry failed remote calls
//! - [`RunReport`] - What happened during a run
//!
//! # Example
//!
//! ```ignore
//! use promptcast::pipeline::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(generator, upscaler, sink, PipelineConfig::default());
//! let report = pipeline
//!     .run(&["cat".to_string()], &["in space".to_string()], 2)
//!     .await?;
//!
//! assert!(report.queues.is_balanced());
//! ```

mod context;
mod error;
mod folder;
mod job;
mod orchestrator;
mod policy;
mod queue;
pub mod stages;
mod stats;

pub use context::{
    ImageGenerator, ImageSink, ImageUpscaler, PipelineConfig, DEFAULT_GENERATE_WORKERS,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPSCALE_WORKERS, MAX_WORKERS,
};
pub use error::{
    GenerationError, PersistenceError, PipelineError, QueueError, StageFailure, UpscaleError,
};
pub use folder::folder_name;
pub use job::{
    describe, GenerationRequest, ImageId, ImagePayload, StoreRequest, UpscaleRequest, Variant,
    DESCRIPTION_SEPARATOR,
};
pub use orchestrator::{Pipeline, PipelineQueues};
pub use policy::{FailurePolicy, DEFAULT_RETRY_BACKOFF};
pub use queue::{QueueCounts, TaskGuard, WorkQueue};
pub use stages::StageSettings;
pub use stats::{InFlightGauge, InFlightGuard, PipelineStats, QueueReport, RunReport};
