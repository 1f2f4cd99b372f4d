//! Run command - generate, upscale and store images for a batch of prompts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use promptcast::config::ConfigFile;
use promptcast::pipeline::{FailurePolicy, Pipeline, PipelineConfig, RunReport};
use promptcast::provider::{AsyncReqwestClient, DalleMiniGenerator, ZyroUpscaler};
use promptcast::storage::DiskImageStore;

use super::common::collect_entries;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Subject phrase (repeatable)
    #[arg(long = "phrase", value_name = "PHRASE")]
    pub phrases: Vec<String>,

    /// Style suffix appended to every phrase (repeatable)
    #[arg(long = "suffix", value_name = "SUFFIX")]
    pub suffixes: Vec<String>,

    /// File with one phrase per line
    #[arg(long, value_name = "FILE")]
    pub phrases_file: Option<PathBuf>,

    /// File with one suffix per line
    #[arg(long, value_name = "FILE")]
    pub suffixes_file: Option<PathBuf>,

    /// Generation requests per phrase/suffix pair
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Output directory (overrides [output] directory)
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Concurrent generation requests (overrides [pipeline] generate_workers)
    #[arg(long, value_name = "N")]
    pub generate_workers: Option<usize>,

    /// Concurrent upscale requests (overrides [pipeline] upscale_workers)
    #[arg(long, value_name = "M")]
    pub upscale_workers: Option<usize>,

    /// Limit in seconds on each remote call (overrides [pipeline] request_timeout)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retry failed remote calls this many times; 0 drops them immediately
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Config file to use instead of ~/.promptcast/config.ini
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref(), args.debug)?;
    runner.log_startup("run");
    let config = runner.config();

    let phrases = collect_entries(&args.phrases, args.phrases_file.as_deref())?;
    let suffixes = collect_entries(&args.suffixes, args.suffixes_file.as_deref())?;
    if phrases.is_empty() {
        return Err(CliError::Input("no phrases given".to_string()));
    }
    if suffixes.is_empty() {
        return Err(CliError::Input("no suffixes given".to_string()));
    }

    let pipeline_config = pipeline_config(config, &args);
    pipeline_config.validate()?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());

    let total = phrases.len() * suffixes.len() * args.count as usize;
    println!(
        "Generating {} description(s) with {} generate / {} upscale workers",
        total, pipeline_config.generate_workers, pipeline_config.upscale_workers
    );
    println!("Output: {}", output.display());
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let report = runtime.block_on(run_pipeline(
        config,
        pipeline_config,
        &output,
        &phrases,
        &suffixes,
        args.count as usize,
    ))?;

    print_summary(&report, &output);

    if report.cancelled {
        return Err(CliError::Interrupted);
    }
    Ok(())
}

/// Applies command-line overrides to the configured pipeline settings.
fn pipeline_config(config: &ConfigFile, args: &RunArgs) -> PipelineConfig {
    let mut pipeline_config = config.pipeline_config();

    if let Some(workers) = args.generate_workers {
        pipeline_config = pipeline_config.with_generate_workers(workers);
    }
    if let Some(workers) = args.upscale_workers {
        pipeline_config = pipeline_config.with_upscale_workers(workers);
    }
    if let Some(secs) = args.timeout {
        pipeline_config = pipeline_config.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(retries) = args.retries {
        let policy = if retries == 0 {
            FailurePolicy::DropOnFailure
        } else {
            FailurePolicy::RetryWithBackoff {
                max_retries: retries,
                initial_backoff: Duration::from_millis(config.pipeline.retry_backoff_ms),
            }
        };
        pipeline_config = pipeline_config.with_failure_policy(policy);
    }

    pipeline_config
}

async fn run_pipeline(
    config: &ConfigFile,
    pipeline_config: PipelineConfig,
    output: &Path,
    phrases: &[String],
    suffixes: &[String],
    count: usize,
) -> Result<RunReport, CliError> {
    let generator_client =
        AsyncReqwestClient::with_timeout(Duration::from_secs(config.generator.timeout))?;
    let upscaler_client =
        AsyncReqwestClient::with_timeout(Duration::from_secs(config.upscaler.timeout))?;

    let pipeline = Pipeline::new(
        Arc::new(DalleMiniGenerator::with_url(
            generator_client,
            &config.generator.url,
        )),
        Arc::new(ZyroUpscaler::with_url(upscaler_client, &config.upscaler.url)),
        Arc::new(DiskImageStore::new(output)),
        pipeline_config,
    );

    let shutdown = CancellationToken::new();
    let signal_listener = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping pipeline");
                eprintln!("\nInterrupted, stopping...");
                shutdown.cancel();
            }
        }
    });

    let report = pipeline
        .run_with_shutdown(phrases, suffixes, count, shutdown)
        .await;
    signal_listener.abort();

    let report = report?;
    info!(files = report.files_stored(), "Run complete");
    Ok(report)
}

fn print_summary(report: &RunReport, output: &Path) {
    let status = if report.cancelled {
        "interrupted"
    } else {
        "complete"
    };

    println!("Run {} in {:.1}s", status, report.elapsed.as_secs_f64());
    println!(
        "  Descriptions: {} submitted, {} failed",
        report.descriptions_submitted, report.generations_failed
    );
    println!(
        "  Images:       {} generated, {} upscaled, {} upscale failures",
        report.images_generated, report.upscales_succeeded, report.upscales_failed
    );
    println!(
        "  Files:        {} small, {} big, {} write failures",
        report.stored_small, report.stored_big, report.stores_failed
    );
    if report.retries > 0 {
        println!("  Retries:      {}", report.retries);
    }
    println!(
        "  Peak calls:   {} generate, {} upscale",
        report.peak_generate_in_flight, report.peak_upscale_in_flight
    );
    println!("  Output:       {}", output.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcast::config::PolicyKind;

    #[test]
    fn test_overrides_replace_config_values() {
        let config = ConfigFile::default();
        let args = RunArgs {
            generate_workers: Some(2),
            upscale_workers: Some(7),
            timeout: Some(15),
            retries: Some(4),
            ..RunArgs::default()
        };

        let pipeline_config = pipeline_config(&config, &args);

        assert_eq!(pipeline_config.generate_workers, 2);
        assert_eq!(pipeline_config.upscale_workers, 7);
        assert_eq!(pipeline_config.request_timeout, Duration::from_secs(15));
        assert_eq!(pipeline_config.failure_policy.max_attempts(), 5);
    }

    #[test]
    fn test_no_overrides_uses_config() {
        let mut config = ConfigFile::default();
        config.pipeline.generate_workers = 3;
        config.pipeline.failure_policy = PolicyKind::Retry;

        let pipeline_config = pipeline_config(&config, &RunArgs::default());

        assert_eq!(pipeline_config, config.pipeline_config());
    }

    #[test]
    fn test_zero_retries_disables_retrying() {
        let mut config = ConfigFile::default();
        config.pipeline.failure_policy = PolicyKind::Retry;
        let args = RunArgs {
            retries: Some(0),
            ..RunArgs::default()
        };

        assert_eq!(
            pipeline_config(&config, &args).failure_policy,
            FailurePolicy::DropOnFailure
        );
    }
}
