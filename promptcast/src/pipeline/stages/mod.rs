//! Pipeline stages for image production.
//!
//! Each stage handles one step for one item:
//!
//! 1. **Generate** - Turn a description into images, queue small variants
//!    for storage and the images for upscaling
//! 2. **Upscale** - Enlarge an image and queue the big variant for storage
//! 3. **Store** - Write a variant to disk
//!
//! Every stage has a `*_worker` loop that pulls from its input queue and
//! acknowledges each item once it is fully handled.

mod generate;
mod store;
mod upscale;

pub use generate::{generate_stage, generate_worker};
pub use store::{store_stage, store_worker};
pub use upscale::{upscale_stage, upscale_worker, UpscaleFailure};

use super::policy::FailurePolicy;
use std::time::Duration;

/// How a stage calls its remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSettings {
    /// Limit on a single attempt
    pub call_timeout: Duration,
    /// What to do when an attempt fails
    pub policy: FailurePolicy,
}
