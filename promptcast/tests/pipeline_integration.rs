//! Integration tests for the image pipeline.
//!
//! These tests run complete batches against in-memory services and a real
//! output directory, verifying:
//! - File layout and id pairing of small and big variants
//! - Per-item failure isolation in every stage
//! - Queue accounting (every put acknowledged)
//! - Concurrency caps against the remote services
//! - Cancellation of a running batch
//! - The HTTP adapters wired into the pipeline

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use promptcast::pipeline::stages::{generate_worker, upscale_worker};
use promptcast::pipeline::{
    FailurePolicy, GenerationError, GenerationRequest, ImageGenerator, ImagePayload,
    ImageUpscaler, Pipeline, PipelineConfig, PipelineQueues, PipelineStats, QueueError,
    RunReport, UpscaleError,
};
use promptcast::provider::{
    AsyncHttpClient, DalleMiniGenerator, ProviderError, ZyroUpscaler,
};
use promptcast::storage::DiskImageStore;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Upper bound on any single run in these tests.
const RUN_LIMIT: Duration = Duration::from_secs(20);

// =============================================================================
// Test Helpers
// =============================================================================

/// A small PNG, base64-encoded the way the services return it.
fn png_payload(shade: u8) -> String {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([shade, shade, 0]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    STANDARD.encode(bytes.into_inner())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Generator returning a fixed number of images, failing any description
/// that contains "broken".
struct FakeGenerator {
    images_per_call: usize,
    delay: Duration,
}

impl FakeGenerator {
    fn new(images_per_call: usize) -> Self {
        Self {
            images_per_call,
            delay: Duration::ZERO,
        }
    }

    fn slow(images_per_call: usize, delay: Duration) -> Self {
        Self {
            images_per_call,
            delay,
        }
    }
}

impl ImageGenerator for FakeGenerator {
    async fn generate(&self, description: &str) -> Result<Vec<ImagePayload>, GenerationError> {
        tokio::time::sleep(self.delay).await;
        if description.contains("broken") {
            return Err(GenerationError::InvalidResponse(
                "service returned no images".into(),
            ));
        }
        Ok((0..self.images_per_call)
            .map(|i| ImagePayload::new(png_payload(i as u8 * 40)))
            .collect())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Upscaler that returns its input, optionally failing every call.
struct FakeUpscaler {
    fail: bool,
    delay: Duration,
}

impl FakeUpscaler {
    fn working() -> Self {
        Self {
            fail: false,
            delay: Duration::ZERO,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            delay: Duration::ZERO,
        }
    }
}

impl ImageUpscaler for FakeUpscaler {
    async fn upscale(&self, image: &ImagePayload) -> Result<ImagePayload, UpscaleError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(UpscaleError::Provider(ProviderError::HttpError(
                "connection reset".into(),
            )));
        }
        Ok(image.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Upscaler that holds every call until [`open`](Self::open) is called.
struct GatedUpscaler {
    gate: tokio::sync::Semaphore,
    entered: AtomicUsize,
}

impl GatedUpscaler {
    fn new() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
            entered: AtomicUsize::new(0),
        }
    }

    fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    fn open(&self) {
        self.gate.close();
    }
}

impl ImageUpscaler for GatedUpscaler {
    async fn upscale(&self, image: &ImagePayload) -> Result<ImagePayload, UpscaleError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        // A closed semaphore lets every waiter through.
        let _ = self.gate.acquire().await;
        Ok(image.clone())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Generator that never answers.
struct HangingGenerator;

impl ImageGenerator for HangingGenerator {
    async fn generate(&self, _description: &str) -> Result<Vec<ImagePayload>, GenerationError> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

/// Files written below `folder`, grouped by image id.
fn files_by_id(folder: &Path) -> BTreeMap<String, BTreeSet<String>> {
    let mut by_id: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in std::fs::read_dir(folder).unwrap() {
        let name = entry.unwrap().file_name().into_string().unwrap();
        let stem = name.strip_suffix(".png").expect("non-png file written");
        let (id, variant) = stem.rsplit_once('_').unwrap();
        by_id
            .entry(id.to_string())
            .or_default()
            .insert(variant.to_string());
    }
    by_id
}

async fn run<G, U>(
    generator: G,
    upscaler: U,
    output: &Path,
    config: PipelineConfig,
    phrases: &[&str],
    suffixes: &[&str],
    count: usize,
) -> RunReport
where
    G: ImageGenerator,
    U: ImageUpscaler,
{
    let pipeline = Pipeline::new(
        Arc::new(generator),
        Arc::new(upscaler),
        Arc::new(DiskImageStore::new(output)),
        config,
    );

    tokio::time::timeout(
        RUN_LIMIT,
        pipeline.run(&strings(phrases), &strings(suffixes), count),
    )
    .await
    .expect("pipeline run did not finish")
    .expect("pipeline run failed")
}

// =============================================================================
// Layout
// =============================================================================

#[tokio::test]
async fn test_count_two_creates_two_ids_in_one_folder() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::new(1),
        FakeUpscaler::working(),
        temp.path(),
        PipelineConfig::default(),
        &["cat"],
        &["in space"],
        2,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 2);
    assert_eq!(report.files_stored(), 4);

    let by_id = files_by_id(&temp.path().join("cat_in_space"));
    assert_eq!(by_id.len(), 2, "expected two distinct ids");
    for variants in by_id.values() {
        assert_eq!(
            variants,
            &BTreeSet::from(["big".to_string(), "small".to_string()])
        );
    }
}

#[tokio::test]
async fn test_cross_product_creates_one_folder_per_description() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::new(3),
        FakeUpscaler::working(),
        temp.path(),
        PipelineConfig::default(),
        &["cat", "dog"],
        &["in space", "oil painting"],
        1,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 4);
    assert_eq!(report.images_generated, 12);
    assert_eq!(report.stored_small, 12);
    assert_eq!(report.stored_big, 12);

    let folders: BTreeSet<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(
        folders,
        BTreeSet::from([
            "cat_in_space".to_string(),
            "cat_oil_painting".to_string(),
            "dog_in_space".to_string(),
            "dog_oil_painting".to_string(),
        ])
    );
    for folder in &folders {
        assert_eq!(files_by_id(&temp.path().join(folder)).len(), 3);
    }
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn test_failed_description_does_not_affect_others() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::new(2),
        FakeUpscaler::working(),
        temp.path(),
        PipelineConfig::default(),
        &["cat", "broken robot", "dog"],
        &["at night"],
        1,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 3);
    assert_eq!(report.generations_failed, 1);
    assert_eq!(report.images_generated, 4);
    assert_eq!(report.files_stored(), 8);
    assert!(report.queues.is_balanced());

    assert!(!temp.path().join("broken_robot_at_night").exists());
    assert_eq!(files_by_id(&temp.path().join("cat_at_night")).len(), 2);
    assert_eq!(files_by_id(&temp.path().join("dog_at_night")).len(), 2);
}

#[tokio::test]
async fn test_upscale_failure_keeps_small_variant() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::new(2),
        FakeUpscaler::failing(),
        temp.path(),
        PipelineConfig::default(),
        &["cat"],
        &["in space"],
        1,
    )
    .await;

    assert_eq!(report.upscales_failed, 2);
    assert_eq!(report.stored_small, 2);
    assert_eq!(report.stored_big, 0);
    assert!(report.queues.is_balanced());

    for variants in files_by_id(&temp.path().join("cat_in_space")).values() {
        assert_eq!(variants, &BTreeSet::from(["small".to_string()]));
    }
}

#[tokio::test]
async fn test_every_queue_is_balanced_after_mixed_failures() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::new(2),
        FakeUpscaler::failing(),
        temp.path(),
        PipelineConfig::default()
            .with_generate_workers(2)
            .with_upscale_workers(1),
        &["cat", "broken", "dog", "bird"],
        &["a", "b"],
        2,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 16);
    assert_eq!(report.generations_failed, 2);
    assert_eq!(report.queues.descriptions.put, 16);
    assert_eq!(report.queues.upscales.put, report.images_generated);
    assert_eq!(report.queues.stores.put, report.images_generated);
    assert!(report.queues.is_balanced());
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_retry_policy_recovers_transient_failures() {
    /// Fails the first call for every description.
    struct FlakyGenerator {
        calls: AtomicU32,
    }

    impl ImageGenerator for FlakyGenerator {
        async fn generate(&self, _description: &str) -> Result<Vec<ImagePayload>, GenerationError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                return Err(GenerationError::Provider(ProviderError::Status {
                    status: 503,
                    url: "http://generator".into(),
                }));
            }
            Ok(vec![ImagePayload::new(png_payload(1))])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    let temp = TempDir::new().unwrap();
    let policy = FailurePolicy::RetryWithBackoff {
        max_retries: 2,
        initial_backoff: Duration::from_millis(5),
    };

    let report = run(
        FlakyGenerator {
            calls: AtomicU32::new(0),
        },
        FakeUpscaler::working(),
        temp.path(),
        PipelineConfig::default()
            .with_generate_workers(1)
            .with_failure_policy(policy),
        &["cat", "dog"],
        &["x"],
        1,
    )
    .await;

    assert_eq!(report.generations_failed, 0);
    assert_eq!(report.retries, 2);
    assert_eq!(report.files_stored(), 4);
}

#[tokio::test]
async fn test_slow_upscaler_times_out_per_call() {
    let temp = TempDir::new().unwrap();
    let upscaler = FakeUpscaler {
        fail: false,
        delay: Duration::from_secs(30),
    };

    let report = run(
        FakeGenerator::new(1),
        upscaler,
        temp.path(),
        PipelineConfig::default().with_request_timeout(Duration::from_millis(100)),
        &["cat"],
        &["x"],
        1,
    )
    .await;

    assert_eq!(report.upscales_failed, 1);
    assert_eq!(report.stored_small, 1);
    assert_eq!(report.stored_big, 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_in_flight_calls_never_exceed_pool_sizes() {
    let temp = TempDir::new().unwrap();
    let upscaler = FakeUpscaler {
        fail: false,
        delay: Duration::from_millis(20),
    };

    let report = run(
        FakeGenerator::slow(2, Duration::from_millis(20)),
        upscaler,
        temp.path(),
        PipelineConfig::default()
            .with_generate_workers(2)
            .with_upscale_workers(3),
        &["a", "b", "c", "d", "e", "f"],
        &["x", "y"],
        1,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 12);
    assert!(report.peak_generate_in_flight >= 1);
    assert!(report.peak_generate_in_flight <= 2);
    assert!(report.peak_upscale_in_flight >= 1);
    assert!(report.peak_upscale_in_flight <= 3);
    assert_eq!(report.files_stored(), 48);
}

#[tokio::test]
async fn test_upscale_queue_holds_at_most_two_pools_while_blocked() {
    const UPSCALE_WORKERS: usize = 2;
    let shutdown = CancellationToken::new();
    let queues = Arc::new(PipelineQueues::new(2, UPSCALE_WORKERS, &shutdown));
    let stats = Arc::new(PipelineStats::new());
    let settings = PipelineConfig::default().stage_settings();
    let generator = Arc::new(FakeGenerator::new(1));
    let upscaler = Arc::new(GatedUpscaler::new());

    let mut workers = tokio::task::JoinSet::new();
    for worker in 0..2 {
        workers.spawn(generate_worker(
            worker,
            Arc::clone(&generator),
            Arc::clone(&queues),
            settings,
            Arc::clone(&stats),
            shutdown.clone(),
        ));
    }
    for worker in 0..UPSCALE_WORKERS {
        workers.spawn(upscale_worker(
            worker,
            Arc::clone(&upscaler),
            Arc::clone(&queues),
            settings,
            Arc::clone(&stats),
            shutdown.clone(),
        ));
    }

    let feeder = tokio::spawn({
        let queues = Arc::clone(&queues);
        async move {
            for i in 0..10 {
                queues
                    .descriptions
                    .put(GenerationRequest::new(format!("cat, pose {}", i)))
                    .await?;
            }
            Ok::<_, QueueError>(())
        }
    });

    // Every upscale worker holds one item and the queue buffers M more.
    tokio::time::timeout(RUN_LIMIT, async {
        while upscaler.entered() < UPSCALE_WORKERS
            || queues.upscales.unfinished() < 2 * UPSCALE_WORKERS
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("upscale queue never filled");

    for _ in 0..10 {
        let unfinished = queues.upscales.unfinished();
        assert!(
            unfinished <= 2 * UPSCALE_WORKERS,
            "upscale queue holds {} unfinished items",
            unfinished
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(upscaler.entered(), UPSCALE_WORKERS);
    assert!(!feeder.is_finished());

    upscaler.open();
    feeder.await.unwrap().unwrap();
    tokio::time::timeout(RUN_LIMIT, async {
        queues.descriptions.join().await.unwrap();
        queues.upscales.join().await.unwrap();
    })
    .await
    .expect("queues never drained");

    assert_eq!(queues.upscales.counts().put, 10);
    assert_eq!(upscaler.entered(), 10);

    queues.close();
    while workers.join_next().await.is_some() {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipeline_on_multi_threaded_runtime() {
    let temp = TempDir::new().unwrap();

    let report = run(
        FakeGenerator::slow(1, Duration::from_millis(5)),
        FakeUpscaler::working(),
        temp.path(),
        PipelineConfig::default(),
        &["a", "b", "c", "d"],
        &["x", "y", "z"],
        3,
    )
    .await;

    assert_eq!(report.descriptions_submitted, 36);
    assert_eq!(report.files_stored(), 72);
    assert!(report.peak_generate_in_flight <= 5);
    assert!(report.peak_upscale_in_flight <= 5);
    assert!(report.queues.is_balanced());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancellation_stops_a_stuck_run() {
    let temp = TempDir::new().unwrap();
    let pipeline = Pipeline::new(
        Arc::new(HangingGenerator),
        Arc::new(FakeUpscaler::working()),
        Arc::new(DiskImageStore::new(temp.path())),
        PipelineConfig::default().with_generate_workers(2),
    );
    let shutdown = CancellationToken::new();

    let canceller = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        })
    };

    let report = tokio::time::timeout(
        RUN_LIMIT,
        pipeline.run_with_shutdown(&strings(&["cat", "dog"]), &strings(&["x"]), 10, shutdown),
    )
    .await
    .expect("cancelled run did not finish")
    .unwrap();
    canceller.await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.files_stored(), 0);
    assert!(report.descriptions_submitted < 20);
}

// =============================================================================
// HTTP adapters
// =============================================================================

/// In-memory HTTP client answering like the generation and upscaling services.
#[derive(Clone)]
struct FakeServices {
    image: String,
}

impl AsyncHttpClient for FakeServices {
    async fn post_json(
        &self,
        url: &str,
        json_body: &str,
        _headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, ProviderError> {
        let request: serde_json::Value = serde_json::from_str(json_body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let response = if url.ends_with("/generate") {
            assert!(request["prompt"].is_string());
            serde_json::json!({ "images": [self.image, self.image] })
        } else if url.ends_with("/upscale") {
            let data_url = request["image_data"].as_str().unwrap_or_default();
            assert!(data_url.starts_with("data:image/jpeg;base64,"));
            serde_json::json!({ "upscaled": format!("data:image/png;base64,{}", self.image) })
        } else {
            return Err(ProviderError::Status {
                status: 404,
                url: url.to_string(),
            });
        };

        Ok(response.to_string().into_bytes())
    }
}

#[tokio::test]
async fn test_http_adapters_end_to_end() {
    let temp = TempDir::new().unwrap();
    let services = FakeServices {
        image: png_payload(128),
    };

    let report = run(
        DalleMiniGenerator::with_url(services.clone(), "http://fake/generate"),
        ZyroUpscaler::with_url(services, "http://fake/upscale"),
        temp.path(),
        PipelineConfig::default(),
        &["lighthouse"],
        &["watercolor, soft light"],
        1,
    )
    .await;

    assert_eq!(report.images_generated, 2);
    assert_eq!(report.stored_small, 2);
    assert_eq!(report.stored_big, 2);

    let folder = temp.path().join("lighthouse_watercolor_soft_light");
    for (id, variants) in files_by_id(&folder) {
        assert_eq!(variants.len(), 2, "image {} is missing a variant", id);
        for variant in variants {
            let path = folder.join(format!("{}_{}.png", id, variant));
            let img = image::open(&path).unwrap();
            assert_eq!((img.width(), img.height()), (8, 8));
        }
    }
}
