//! Store stage - writes image variants through the sink.

use crate::pipeline::{ImageSink, PersistenceError, PipelineQueues, PipelineStats, StoreRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Persists one image variant.
#[instrument(skip_all, fields(image_id = %request.id, variant = %request.variant))]
pub async fn store_stage<S>(request: &StoreRequest, sink: &S) -> Result<PathBuf, PersistenceError>
where
    S: ImageSink,
{
    sink.store(&request.folder, request.id, request.variant, &request.image)
        .await
}

/// Runs the store worker until the store queue closes.
///
/// A write that fails is logged and the item dropped; the worker keeps
/// going. Disk writes are not the bottleneck next to the remote calls, and
/// writing serially avoids races between concurrent directory creation, so
/// one worker is enough.
pub async fn store_worker<S>(
    sink: Arc<S>,
    queues: Arc<PipelineQueues>,
    stats: Arc<PipelineStats>,
    shutdown: CancellationToken,
) where
    S: ImageSink,
{
    debug!("Store worker started");

    while let Some((request, guard)) = queues.stores.get().await {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = store_stage(&request, sink.as_ref()) => result,
        };

        match result {
            Ok(path) => {
                stats.stored(request.is_upscaled());
                info!(
                    image_id = %request.id,
                    variant = %request.variant,
                    path = %path.display(),
                    "Stored image"
                );
            }
            Err(e) => {
                stats.store_failed();
                warn!(
                    image_id = %request.id,
                    variant = %request.variant,
                    error = %e,
                    "Could not store image, dropping it"
                );
            }
        }

        guard.done();
    }

    debug!("Store worker stopped");
}
