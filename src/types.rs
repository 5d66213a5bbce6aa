// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub regions: RegionsConfig,
    pub calibration: CalibrationConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// IoU a detection must exceed to occupy a parking slot
    pub slot_overlap_threshold: f32,
    /// IoU a detection must exceed to count as parked in an illegal zone
    pub zone_overlap_threshold: f32,
    /// Pro-rated parking fee per hour
    pub fee_per_hour: f64,
    /// Pending events kept on the bus before the oldest are dropped
    pub event_bus_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            slot_overlap_threshold: 0.40,
            zone_overlap_threshold: 0.30,
            fee_per_hour: 40.0,
            event_bus_capacity: 1024,
        }
    }
}

/// Fallback slot/zone geometry, same shape as the calibration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionsConfig {
    pub parking_slots: BTreeMap<String, Rect>,
    pub illegal_zones: BTreeMap<String, Rect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub input_dir: String,
    /// Frames without detections are not fed to the trackers at all
    pub skip_empty_frames: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub event_log_csv: String,
    pub events_jsonl: String,
    pub summary_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

// ============================================================================
// GEOMETRY & DETECTIONS
// ============================================================================

pub type TrackId = u32;

/// Axis-aligned box in pixel coordinates. Always satisfies `x1 <= x2 && y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    /// Build from any two opposite corners.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

impl From<[f32; 4]> for Rect {
    fn from(b: [f32; 4]) -> Self {
        Rect::new(b[0], b[1], b[2], b[3])
    }
}

impl From<Rect> for [f32; 4] {
    fn from(r: Rect) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub class_name: String,
    pub bbox: Rect,
    pub confidence: f32,
}

/// A calibrated parking slot or illegal zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub bounds: Rect,
}

pub type Slot = Region;
pub type Zone = Region;

impl Region {
    pub fn new(id: impl Into<String>, bounds: Rect) -> Self {
        Self {
            id: id.into(),
            bounds,
        }
    }
}

/// Complete slot + zone layout for one calibration session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    pub slots: Vec<Slot>,
    pub zones: Vec<Zone>,
}

impl RegionSet {
    pub fn from_maps(slots: &BTreeMap<String, Rect>, zones: &BTreeMap<String, Rect>) -> Self {
        Self {
            slots: slots
                .iter()
                .map(|(id, bounds)| Region::new(id.clone(), *bounds))
                .collect(),
            zones: zones
                .iter()
                .map(|(id, bounds)| Region::new(id.clone(), *bounds))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.zones.is_empty()
    }
}

// ============================================================================
// ENRICHMENT
// ============================================================================

/// Plate-reader output attached to a track. Any field may still be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub region_name: Option<String>,
}

/// Outcome of an enrichment lookup. `Unrecognized` means the plate reader has
/// produced nothing for this track yet; `Recognized` may still carry empty fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition<'a> {
    Unrecognized,
    Recognized(&'a Enrichment),
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentMap {
    entries: HashMap<TrackId, Enrichment>,
}

impl EnrichmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, track_id: TrackId, enrichment: Enrichment) {
        self.entries.insert(track_id, enrichment);
    }

    pub fn lookup(&self, track_id: TrackId) -> Recognition<'_> {
        match self.entries.get(&track_id) {
            Some(e) => Recognition::Recognized(e),
            None => Recognition::Unrecognized,
        }
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.entries.contains_key(&track_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TrackId, Enrichment)> for EnrichmentMap {
    fn from_iter<I: IntoIterator<Item = (TrackId, Enrichment)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// OCCUPANCY RECORDS
// ============================================================================

/// Identity of whatever currently sits in a slot or zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupantRef {
    pub track_id: TrackId,
    pub class_name: String,
    pub plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub region_name: Option<String>,
}

impl OccupantRef {
    pub fn from_detection(det: &Detection, recognition: Recognition<'_>) -> Self {
        let (plate, vehicle_type, region_name) = match recognition {
            Recognition::Recognized(e) => (
                e.plate.clone(),
                e.vehicle_type.clone(),
                e.region_name.clone(),
            ),
            Recognition::Unrecognized => (None, None, None),
        };
        Self {
            track_id: det.track_id,
            class_name: det.class_name.clone(),
            plate,
            vehicle_type,
            region_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    #[default]
    Available,
    Occupied,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Occupied => "OCCUPIED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::In => "IN",
            EventKind::Out => "OUT",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Slot entry or exit. `duration_minutes` and `fee` are only set on `OUT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingEvent {
    pub slot_id: String,
    pub kind: EventKind,
    pub track_id: TrackId,
    pub class_name: String,
    pub plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub region_name: Option<String>,
    pub timestamp: String,
    pub duration_minutes: Option<f64>,
    pub fee: Option<f64>,
}

impl ParkingEvent {
    pub fn entry(slot_id: &str, occupant: &OccupantRef, timestamp: &str) -> Self {
        Self {
            slot_id: slot_id.to_string(),
            kind: EventKind::In,
            track_id: occupant.track_id,
            class_name: occupant.class_name.clone(),
            plate: occupant.plate.clone(),
            vehicle_type: occupant.vehicle_type.clone(),
            region_name: occupant.region_name.clone(),
            timestamp: timestamp.to_string(),
            duration_minutes: None,
            fee: None,
        }
    }

    pub fn exit(
        slot_id: &str,
        occupant: &OccupantRef,
        timestamp: &str,
        duration_minutes: f64,
        fee: f64,
    ) -> Self {
        Self {
            kind: EventKind::Out,
            duration_minutes: Some(duration_minutes),
            fee: Some(fee),
            ..Self::entry(slot_id, occupant, timestamp)
        }
    }

    pub fn plate_or_na(&self) -> &str {
        self.plate.as_deref().unwrap_or("N/A")
    }
}

/// One illegal-parking episode, recorded when a track first enters a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub zone_id: String,
    pub track_id: TrackId,
    pub class_name: String,
    pub plate: Option<String>,
    pub vehicle_type: Option<String>,
    pub region_name: Option<String>,
    pub timestamp: String,
    pub frame_number: u64,
    pub bbox: Rect,
}

impl Violation {
    pub fn plate_or_na(&self) -> &str {
        self.plate.as_deref().unwrap_or("N/A")
    }
}
