//! promptcast - batch image generation from text prompts
//!
//! This library turns a list of phrases and suffixes into generated images,
//! upscales every image and stores both variants on disk. Generation and
//! upscaling are remote calls, so the work runs through a bounded
//! concurrent pipeline that caps the number of outstanding requests against
//! each service.
//!
//! # High-Level API
//!
//! ```ignore
//! use promptcast::config::ConfigFile;
//! use promptcast::pipeline::Pipeline;
//! use promptcast::provider::{AsyncReqwestClient, DalleMiniGenerator, ZyroUpscaler};
//! use promptcast::storage::DiskImageStore;
//! use std::sync::Arc;
//!
//! let config = ConfigFile::load()?;
//! let client = AsyncReqwestClient::new()?;
//!
//! let pipeline = Pipeline::new(
//!     Arc::new(DalleMiniGenerator::with_url(client.clone(), &config.generator.url)),
//!     Arc::new(ZyroUpscaler::with_url(client, &config.upscaler.url)),
//!     Arc::new(DiskImageStore::new(&config.output.directory)),
//!     config.pipeline_config(),
//! );
//!
//! let report = pipeline.run(&phrases, &suffixes, 2).await?;
//! ```

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod storage;

/// Version of the promptcast library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
