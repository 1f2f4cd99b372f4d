//! Run statistics.
//!
//! Workers record what happened to each item in a [`PipelineStats`] owned by
//! the run. The orchestrator turns it into a [`RunReport`] when the run ends,
//! so callers read results from the return value rather than from global
//! counters.

use super::queue::QueueCounts;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Tracks concurrent calls into one remote service.
///
/// Holds the current number of calls in flight and the highest number seen.
#[derive(Debug)]
pub struct InFlightGauge {
    label: &'static str,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Marks the start of a call. The call ends when the guard drops.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.update_peak(current);
        InFlightGuard { gauge: self }
    }

    /// Updates the peak counter if current exceeds it.
    fn update_peak(&self, current: usize) {
        let mut peak = self.peak.load(Ordering::SeqCst);
        while current > peak {
            match self.peak.compare_exchange_weak(
                peak,
                current,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    pub fn label(&self) -> &str {
        self.label
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A call in flight. Decrements its gauge when dropped.
pub struct InFlightGuard<'a> {
    gauge: &'a InFlightGauge,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-run counters updated by the stage workers.
#[derive(Debug)]
pub struct PipelineStats {
    descriptions_submitted: AtomicU64,
    generations_failed: AtomicU64,
    images_generated: AtomicU64,
    upscales_succeeded: AtomicU64,
    upscales_failed: AtomicU64,
    stored_small: AtomicU64,
    stored_big: AtomicU64,
    stores_failed: AtomicU64,
    retries: AtomicU64,
    /// Generation calls currently running
    pub generate_in_flight: InFlightGauge,
    /// Upscale calls currently running
    pub upscale_in_flight: InFlightGauge,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            descriptions_submitted: AtomicU64::new(0),
            generations_failed: AtomicU64::new(0),
            images_generated: AtomicU64::new(0),
            upscales_succeeded: AtomicU64::new(0),
            upscales_failed: AtomicU64::new(0),
            stored_small: AtomicU64::new(0),
            stored_big: AtomicU64::new(0),
            stores_failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            generate_in_flight: InFlightGauge::new("generate"),
            upscale_in_flight: InFlightGauge::new("upscale"),
        }
    }

    pub fn description_submitted(&self) {
        self.descriptions_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation_failed(&self) {
        self.generations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn image_generated(&self) {
        self.images_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upscale_succeeded(&self) {
        self.upscales_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upscale_failed(&self) {
        self.upscales_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stored(&self, upscaled: bool) {
        if upscaled {
            self.stored_big.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stored_small.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn store_failed(&self) {
        self.stores_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures the counters into a report.
    pub fn report(&self, queues: QueueReport, elapsed: Duration, cancelled: bool) -> RunReport {
        RunReport {
            descriptions_submitted: self.descriptions_submitted.load(Ordering::Relaxed),
            generations_failed: self.generations_failed.load(Ordering::Relaxed),
            images_generated: self.images_generated.load(Ordering::Relaxed),
            upscales_succeeded: self.upscales_succeeded.load(Ordering::Relaxed),
            upscales_failed: self.upscales_failed.load(Ordering::Relaxed),
            stored_small: self.stored_small.load(Ordering::Relaxed),
            stored_big: self.stored_big.load(Ordering::Relaxed),
            stores_failed: self.stores_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            peak_generate_in_flight: self.generate_in_flight.peak(),
            peak_upscale_in_flight: self.upscale_in_flight.peak(),
            queues,
            elapsed,
            cancelled,
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Put/acknowledge totals for the three queues of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub descriptions: QueueCounts,
    pub upscales: QueueCounts,
    pub stores: QueueCounts,
}

impl QueueReport {
    /// True when every queue acknowledged exactly what was put.
    pub fn is_balanced(&self) -> bool {
        [self.descriptions, self.upscales, self.stores]
            .iter()
            .all(|c| c.put == c.acknowledged)
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Descriptions put on the descriptions queue
    pub descriptions_submitted: u64,
    /// Descriptions dropped after generation failed
    pub generations_failed: u64,
    /// Images returned by the generator
    pub images_generated: u64,
    pub upscales_succeeded: u64,
    pub upscales_failed: u64,
    /// Small variants written to disk
    pub stored_small: u64,
    /// Big variants written to disk
    pub stored_big: u64,
    pub stores_failed: u64,
    /// Extra attempts made by the retry policy
    pub retries: u64,
    /// Highest number of concurrent generation calls
    pub peak_generate_in_flight: usize,
    /// Highest number of concurrent upscale calls
    pub peak_upscale_in_flight: usize,
    pub queues: QueueReport,
    pub elapsed: Duration,
    /// The run was stopped by the shutdown signal before draining
    pub cancelled: bool,
}

impl RunReport {
    /// Total files written.
    pub fn files_stored(&self) -> u64 {
        self.stored_small + self.stored_big
    }
}
