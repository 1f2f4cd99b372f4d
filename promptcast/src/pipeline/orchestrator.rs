//! Pipeline orchestration.
//!
//! [`Pipeline`] wires the worker pools onto the three queues, seeds the
//! descriptions queue from the phrase/suffix cross-product and decides when
//! the run is complete.
//!
//! # Completion
//!
//! The queues are joined in pipeline order: descriptions, then upscales,
//! then stores. Once descriptions are drained no more upscale or store items
//! can appear from the generate stage, and once upscales are drained no more
//! store items can appear at all. Joining in any other order could return
//! while upstream work still feeds a downstream queue.
//!
//! # Shutdown
//!
//! Cancelling the shutdown token wakes every blocked queue operation. Workers
//! abandon their current item, the joins return early and the run reports
//! `cancelled = true`.

use super::context::{ImageGenerator, ImageSink, ImageUpscaler, PipelineConfig};
use super::error::{PipelineError, QueueError};
use super::job::{GenerationRequest, StoreRequest, UpscaleRequest};
use super::queue::WorkQueue;
use super::stages::{generate_worker, store_worker, upscale_worker};
use super::stats::{PipelineStats, QueueReport, RunReport};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// The three queues of a run.
pub struct PipelineQueues {
    /// Bounded; capacity is the generate pool size
    pub descriptions: WorkQueue<GenerationRequest>,
    /// Bounded; capacity is the upscale pool size
    pub upscales: WorkQueue<UpscaleRequest>,
    /// Unbounded, so storage never blocks the remote stages
    pub stores: WorkQueue<StoreRequest>,
}

impl PipelineQueues {
    /// Creates the queues for one run.
    ///
    /// # Panics
    ///
    /// Panics if either capacity is 0.
    pub fn new(
        descriptions_capacity: usize,
        upscales_capacity: usize,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            descriptions: WorkQueue::bounded("descriptions", descriptions_capacity, shutdown),
            upscales: WorkQueue::bounded("upscales", upscales_capacity, shutdown),
            stores: WorkQueue::unbounded("stores", shutdown),
        }
    }

    /// Closes every queue so that idle workers exit.
    pub fn close(&self) {
        self.descriptions.close();
        self.upscales.close();
        self.stores.close();
    }

    /// Put/acknowledge totals for all three queues.
    pub fn counts(&self) -> QueueReport {
        QueueReport {
            descriptions: self.descriptions.counts(),
            upscales: self.upscales.counts(),
            stores: self.stores.counts(),
        }
    }
}

/// Runs batches of descriptions through generate, upscale and store.
///
/// # Type Parameters
///
/// * `G` - Image generator
/// * `U` - Image upscaler
/// * `S` - Image sink
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::new(
///     Arc::new(DalleMiniGenerator::new(client.clone())),
///     Arc::new(ZyroUpscaler::new(client)),
///     Arc::new(DiskImageStore::new("results")),
///     PipelineConfig::default(),
/// );
///
/// let report = pipeline.run(&phrases, &suffixes, 2).await?;
/// println!("{} files stored", report.files_stored());
/// ```
pub struct Pipeline<G, U, S> {
    generator: Arc<G>,
    upscaler: Arc<U>,
    sink: Arc<S>,
    config: PipelineConfig,
}

impl<G, U, S> Pipeline<G, U, S>
where
    G: ImageGenerator,
    U: ImageUpscaler,
    S: ImageSink,
{
    pub fn new(generator: Arc<G>, upscaler: Arc<U>, sink: Arc<S>, config: PipelineConfig) -> Self {
        Self {
            generator,
            upscaler,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one batch to completion.
    ///
    /// Every `(phrase, suffix)` pair is requested `count` times.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// unusable. Failures of individual items are counted in the report,
    /// never returned.
    pub async fn run(
        &self,
        phrases: &[String],
        suffixes: &[String],
        count: usize,
    ) -> Result<RunReport, PipelineError> {
        self.run_with_shutdown(phrases, suffixes, count, CancellationToken::new())
            .await
    }

    /// Runs one batch, stopping early if `shutdown` is cancelled.
    #[instrument(skip_all, fields(
        phrases = phrases.len(),
        suffixes = suffixes.len(),
        count = count,
        generator = self.generator.name(),
        upscaler = self.upscaler.name(),
    ))]
    pub async fn run_with_shutdown(
        &self,
        phrases: &[String],
        suffixes: &[String],
        count: usize,
        shutdown: CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let started = Instant::now();
        let queues = Arc::new(PipelineQueues::new(
            self.config.generate_workers,
            self.config.upscale_workers,
            &shutdown,
        ));
        let stats = Arc::new(PipelineStats::new());
        let settings = self.config.stage_settings();

        info!(
            generate_workers = self.config.generate_workers,
            upscale_workers = self.config.upscale_workers,
            timeout_secs = self.config.request_timeout.as_secs(),
            policy = %self.config.failure_policy,
            "Starting pipeline run"
        );

        let mut workers = JoinSet::new();
        for worker in 0..self.config.generate_workers {
            workers.spawn(generate_worker(
                worker,
                Arc::clone(&self.generator),
                Arc::clone(&queues),
                settings,
                Arc::clone(&stats),
                shutdown.clone(),
            ));
        }
        for worker in 0..self.config.upscale_workers {
            workers.spawn(upscale_worker(
                worker,
                Arc::clone(&self.upscaler),
                Arc::clone(&queues),
                settings,
                Arc::clone(&stats),
                shutdown.clone(),
            ));
        }
        workers.spawn(store_worker(
            Arc::clone(&self.sink),
            Arc::clone(&queues),
            Arc::clone(&stats),
            shutdown.clone(),
        ));

        let outcome = feed_and_drain(phrases, suffixes, count, &queues, &stats).await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Pipeline run interrupted");
        }

        queues.close();
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Pipeline worker failed");
            }
        }

        let cancelled = outcome.is_err() || shutdown.is_cancelled();
        let report = stats.report(queues.counts(), started.elapsed(), cancelled);

        info!(
            descriptions = report.descriptions_submitted,
            generations_failed = report.generations_failed,
            images = report.images_generated,
            upscales_failed = report.upscales_failed,
            stored_small = report.stored_small,
            stored_big = report.stored_big,
            stores_failed = report.stores_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            cancelled,
            "Pipeline run finished"
        );

        Ok(report)
    }
}

/// Seeds the descriptions queue and waits for every queue to drain.
async fn feed_and_drain(
    phrases: &[String],
    suffixes: &[String],
    count: usize,
    queues: &PipelineQueues,
    stats: &PipelineStats,
) -> Result<(), QueueError> {
    for request in GenerationRequest::cross_product(phrases, suffixes, count) {
        debug!(description = %request.description, "Submitting description");
        queues.descriptions.put(request).await?;
        stats.description_submitted();
    }

    queues.descriptions.join().await?;
    debug!("Descriptions drained");
    queues.upscales.join().await?;
    debug!("Upscales drained");
    queues.stores.join().await?;
    debug!("Stores drained");

    Ok(())
}
