// src/tracking/mod.rs
//
// Occupancy & violation tracking core.
//
// Signal flow per frame:
//   Detections + Enrichment + Timestamp → slot_tracker.update()  ─┐
//                                       → zone_tracker.detect()  ─┴→ classifier → RegionStatus
//
// The two trackers share no mutable state; the classifier only reads them.

pub mod classifier;
pub mod slot_tracker;
pub mod zone_tracker;

pub use classifier::{
    classify_slot, RegionOverlay, RegionStatus, StatusClassifier, StatusCounts, StatusKind,
};
pub use slot_tracker::{SlotState, SlotStatistics, SlotTracker, SlotTrackerConfig, SlotUpdate};
pub use zone_tracker::{ZoneStatistics, ZoneTracker, ZoneTrackerConfig};
