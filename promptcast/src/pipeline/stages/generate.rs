//! Generate stage - turns descriptions into images.
//!
//! For every image the generator returns, this stage mints a fresh
//! [`ImageId`] and emits two items: the small-variant store request first,
//! then the upscale request. The store request always precedes its upscale
//! request, so the small variant is queued even if upscaling later fails.

use super::StageSettings;
use crate::pipeline::{
    GenerationError, GenerationRequest, ImageGenerator, ImageId, PipelineQueues, PipelineStats,
    StoreRequest, UpscaleRequest,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Generates images for one description and queues the results.
///
/// # Returns
///
/// The number of images queued. If the queues shut down part way through,
/// the images queued so far are counted and the rest are discarded.
///
/// # Errors
///
/// Returns the generator's error once the failure policy gives up. No items
/// are queued in that case.
#[instrument(skip_all, fields(description = %request.description))]
pub async fn generate_stage<G>(
    request: &GenerationRequest,
    generator: &G,
    queues: &PipelineQueues,
    settings: &StageSettings,
    stats: &PipelineStats,
) -> Result<usize, GenerationError>
where
    G: ImageGenerator,
{
    let images = settings
        .policy
        .execute(
            settings.call_timeout,
            |error: &GenerationError, attempt| {
                stats.retried();
                debug!(attempt, error = %error, "Retrying generation");
            },
            move || async move {
                let _in_flight = stats.generate_in_flight.enter();
                generator.generate(&request.description).await
            },
        )
        .await?;

    let folder = request.folder();
    let mut queued = 0;

    for image in images {
        let id = ImageId::new();
        stats.image_generated();

        debug!(image_id = %id, "Creating store request");
        if queues
            .stores
            .put(StoreRequest::small(folder.clone(), id, image.clone()))
            .await
            .is_err()
        {
            debug!(image_id = %id, "Store queue closed, discarding remaining images");
            break;
        }

        debug!(image_id = %id, "Creating upscale request");
        if queues
            .upscales
            .put(UpscaleRequest::new(folder.clone(), id, image))
            .await
            .is_err()
        {
            debug!(image_id = %id, "Upscale queue closed, discarding remaining images");
            break;
        }

        queued += 1;
    }

    Ok(queued)
}

/// Runs one generate worker until the descriptions queue closes.
///
/// Each description is acknowledged exactly once whatever happens to it.
/// A failed description is logged and dropped; the worker then moves on.
pub async fn generate_worker<G>(
    worker: usize,
    generator: Arc<G>,
    queues: Arc<PipelineQueues>,
    settings: StageSettings,
    stats: Arc<PipelineStats>,
    shutdown: CancellationToken,
) where
    G: ImageGenerator,
{
    debug!(worker, generator = generator.name(), "Generate worker started");

    while let Some((request, guard)) = queues.descriptions.get().await {
        debug!(worker, description = %request.description, "Fetched description");

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = generate_stage(&request, generator.as_ref(), &queues, &settings, &stats) => result,
        };

        match result {
            Ok(count) => {
                info!(worker, description = %request.description, images = count, "Generation complete");
            }
            Err(e) => {
                stats.generation_failed();
                warn!(
                    worker,
                    description = %request.description,
                    error = %e,
                    "Could not generate images, dropping description"
                );
            }
        }

        guard.done();
    }

    debug!(worker, "Generate worker stopped");
}
