//! Upscale stage - turns small images into big ones.
//!
//! On success this stage queues the big-variant store request under the
//! same id and folder. A failure only costs the big variant; the small one
//! was queued for storage by the generate stage.

use super::StageSettings;
use crate::pipeline::{
    ImageUpscaler, PipelineQueues, PipelineStats, QueueError, UpscaleError, UpscaleRequest,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Why an upscale request produced no big variant.
#[derive(Debug)]
pub enum UpscaleFailure {
    /// The upscaler failed
    Upscale(UpscaleError),
    /// The upscaled image could not be queued
    Queue(QueueError),
}

/// Upscales one image and queues the big variant for storage.
#[instrument(skip_all, fields(image_id = %request.id))]
pub async fn upscale_stage<U>(
    request: UpscaleRequest,
    upscaler: &U,
    queues: &PipelineQueues,
    settings: &StageSettings,
    stats: &PipelineStats,
) -> Result<(), UpscaleFailure>
where
    U: ImageUpscaler,
{
    let image = &request.image;
    let upscaled = settings
        .policy
        .execute(
            settings.call_timeout,
            |error: &UpscaleError, attempt| {
                stats.retried();
                debug!(attempt, error = %error, "Retrying upscale");
            },
            move || async move {
                let _in_flight = stats.upscale_in_flight.enter();
                upscaler.upscale(image).await
            },
        )
        .await
        .map_err(UpscaleFailure::Upscale)?;

    queues
        .stores
        .put(request.into_store_request(upscaled))
        .await
        .map_err(UpscaleFailure::Queue)
}

/// Runs one upscale worker until the upscale queue closes.
///
/// Each request is acknowledged exactly once whatever happens to it.
pub async fn upscale_worker<U>(
    worker: usize,
    upscaler: Arc<U>,
    queues: Arc<PipelineQueues>,
    settings: StageSettings,
    stats: Arc<PipelineStats>,
    shutdown: CancellationToken,
) where
    U: ImageUpscaler,
{
    debug!(worker, upscaler = upscaler.name(), "Upscale worker started");

    while let Some((request, guard)) = queues.upscales.get().await {
        let id = request.id;
        debug!(worker, image_id = %id, "Fetched upscale request");

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = upscale_stage(request, upscaler.as_ref(), &queues, &settings, &stats) => result,
        };

        match result {
            Ok(()) => {
                stats.upscale_succeeded();
                debug!(worker, image_id = %id, "Upscale complete");
            }
            Err(UpscaleFailure::Upscale(e)) => {
                stats.upscale_failed();
                warn!(
                    worker,
                    image_id = %id,
                    error = %e,
                    "Could not upscale image, keeping small variant only"
                );
            }
            Err(UpscaleFailure::Queue(e)) => {
                debug!(worker, image_id = %id, error = %e, "Discarding upscaled image");
            }
        }

        guard.done();
    }

    debug!(worker, "Upscale worker stopped");
}
