// src/pipeline/metrics.rs
//
// Pipeline observability. Counters are atomics so the status side can read
// them while frames are being processed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub skipped_frames: Arc<AtomicU64>,
    pub frames_with_vehicles: Arc<AtomicU64>,
    pub parking_entries: Arc<AtomicU64>,
    pub parking_exits: Arc<AtomicU64>,
    pub violations: Arc<AtomicU64>,
    pub unique_vehicles: Arc<AtomicU64>,
    pub recalibrations: Arc<AtomicU64>,
    /// Events evicted from a full event bus before any sink saw them
    pub dropped_events: Arc<AtomicU64>,
    pub frame_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            skipped_frames: Arc::new(AtomicU64::new(0)),
            frames_with_vehicles: Arc::new(AtomicU64::new(0)),
            parking_entries: Arc::new(AtomicU64::new(0)),
            parking_exits: Arc::new(AtomicU64::new(0)),
            violations: Arc::new(AtomicU64::new(0)),
            unique_vehicles: Arc::new(AtomicU64::new(0)),
            recalibrations: Arc::new(AtomicU64::new(0)),
            dropped_events: Arc::new(AtomicU64::new(0)),
            frame_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set(&self, counter: &AtomicU64, value: u64) {
        counter.store(value, Ordering::Relaxed);
    }

    /// Frames per second since the metrics were created.
    pub fn fps(&self) -> f64 {
        frame_rate(
            self.total_frames.load(Ordering::Relaxed),
            self.started_at.elapsed().as_secs_f64(),
        )
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            skipped_frames: self.skipped_frames.load(Ordering::Relaxed),
            frames_with_vehicles: self.frames_with_vehicles.load(Ordering::Relaxed),
            parking_entries: self.parking_entries.load(Ordering::Relaxed),
            parking_exits: self.parking_exits.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            unique_vehicles: self.unique_vehicles.load(Ordering::Relaxed),
            recalibrations: self.recalibrations.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            last_frame_us: self.frame_time_us.load(Ordering::Relaxed),
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub skipped_frames: u64,
    pub frames_with_vehicles: u64,
    pub parking_entries: u64,
    pub parking_exits: u64,
    pub violations: u64,
    pub unique_vehicles: u64,
    pub recalibrations: u64,
    pub dropped_events: u64,
    pub last_frame_us: u64,
    pub fps: f64,
    pub elapsed_secs: f64,
}

// Rates over the first few milliseconds are noise.
fn frame_rate(frames: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.01 {
        return 0.0;
    }
    frames as f64 / elapsed_secs
}
