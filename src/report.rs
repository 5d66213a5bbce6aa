// src/report.rs
//
// End-of-session summary, written once after every log has been replayed.

use crate::pipeline::{EngineStatistics, MetricsSummary};
use crate::timestamp::{now_string, round2, TimestampSpan};
use crate::tracking::StatusCounts;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ParkingSummary {
    pub total_slots: usize,
    pub currently_occupied: usize,
    pub currently_available: usize,
    pub total_parking_events: usize,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IllegalParkingSummary {
    pub total_violations: usize,
    pub active_violators: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub video_source: String,
    pub start_time: String,
    pub end_time: String,
    pub total_duration_minutes: f64,
    pub total_vehicles_detected: usize,
    pub parking_statistics: ParkingSummary,
    pub illegal_parking: IllegalParkingSummary,
    pub status_counts: StatusCounts,
    pub pipeline: MetricsSummary,
    pub generated_at: String,
}

impl SessionSummary {
    pub fn build(
        video_source: impl Into<String>,
        span: TimestampSpan,
        stats: &EngineStatistics,
        unique_vehicles: usize,
        metrics: MetricsSummary,
    ) -> Self {
        Self {
            video_source: video_source.into(),
            start_time: span.start_time,
            end_time: span.end_time,
            total_duration_minutes: span.duration_minutes,
            total_vehicles_detected: unique_vehicles,
            parking_statistics: ParkingSummary {
                total_slots: stats.slots.total_slots,
                currently_occupied: stats.slots.occupied,
                currently_available: stats.slots.available,
                total_parking_events: stats.slots.total_events,
                total_revenue: round2(stats.slots.total_revenue),
            },
            illegal_parking: IllegalParkingSummary {
                total_violations: stats.zones.total_violations,
                active_violators: stats.zones.active_violators,
            },
            status_counts: stats.statuses,
            pipeline: metrics,
            generated_at: now_string(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary {}", path.display()))?;
        info!("💾 Summary saved to: {}", path.display());
        Ok(())
    }

    pub fn log(&self) {
        info!("\n========================================");
        info!("📊 SESSION SUMMARY");
        info!("========================================");
        info!("  Source: {}", self.video_source);
        info!(
            "  Period: {} → {} ({:.2} min)",
            self.start_time, self.end_time, self.total_duration_minutes
        );
        info!("  Vehicles detected: {}", self.total_vehicles_detected);
        info!(
            "  Slots: {} total, {} occupied, {} available",
            self.parking_statistics.total_slots,
            self.parking_statistics.currently_occupied,
            self.parking_statistics.currently_available
        );
        info!(
            "  Parking events: {}, revenue: {:.2}",
            self.parking_statistics.total_parking_events, self.parking_statistics.total_revenue
        );
        info!(
            "  Illegal parking: {} violations, {} active",
            self.illegal_parking.total_violations, self.illegal_parking.active_violators
        );
        info!(
            "  Frames: {} processed, {} skipped ({:.1} FPS)",
            self.pipeline.total_frames, self.pipeline.skipped_frames, self.pipeline.fps
        );
        info!("========================================\n");
    }
}
