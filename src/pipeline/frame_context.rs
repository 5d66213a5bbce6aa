// src/pipeline/frame_context.rs
//
// Everything the trackers see for one frame, and everything they produced.
// Both trackers read the same input so slot and zone results always refer to
// the same detections and timestamp.

use crate::tracking::{RegionStatus, StatusCounts};
use crate::types::{Detection, ParkingEvent, TrackId, Violation};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct FrameInput {
    pub frame_number: u64,
    /// Canonical timestamp for this frame
    pub timestamp: String,
    pub detections: Vec<Detection>,
}

impl FrameInput {
    pub fn new(frame_number: u64, timestamp: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            frame_number,
            timestamp: timestamp.into(),
            detections,
        }
    }

    pub fn has_vehicles(&self) -> bool {
        !self.detections.is_empty()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.detections.iter().map(|d| d.track_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub frame_number: u64,
    pub events: Vec<ParkingEvent>,
    pub violations: Vec<Violation>,
}

impl FrameOutput {
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty() && self.violations.is_empty()
    }
}

/// Classified view published to subscribers after every frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Last frame folded into this snapshot (0 before the first frame)
    pub frame_number: u64,
    pub statuses: BTreeMap<String, RegionStatus>,
    pub counts: StatusCounts,
}
