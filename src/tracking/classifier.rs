// src/tracking/classifier.rs
//
// Canonical per-region status for dashboards and the status API.
//
// The classifier owns nothing. It borrows both trackers and recomputes every
// answer on each call, so a reader always sees whatever the last
// `update`/`detect` left behind.

use super::slot_tracker::SlotTracker;
use super::zone_tracker::ZoneTracker;
use crate::error::EngineError;
use crate::types::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Available,
    Occupied,
    IllegalZone,
    IllegalOccupied,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Available => "AVAILABLE",
            StatusKind::Occupied => "OCCUPIED",
            StatusKind::IllegalZone => "ILLEGAL_ZONE",
            StatusKind::IllegalOccupied => "ILLEGAL_OCCUPIED",
        }
    }

    /// Display colour as `#RRGGBB`.
    pub fn color(&self) -> &'static str {
        match self {
            StatusKind::Available => "#22C55E",
            StatusKind::Occupied => "#EF4444",
            StatusKind::IllegalZone => "#F59E0B",
            StatusKind::IllegalOccupied => "#991B1B",
        }
    }

    pub fn is_illegal(&self) -> bool {
        matches!(self, StatusKind::IllegalZone | StatusKind::IllegalOccupied)
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionStatus {
    pub region_id: String,
    pub status: StatusKind,
    pub color: &'static str,
    pub plate: Option<String>,
}

impl RegionStatus {
    pub fn is_illegal(&self) -> bool {
        self.status.is_illegal()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub available: usize,
    pub occupied: usize,
    pub illegal_zone: usize,
    pub illegal_occupied: usize,
    pub total: usize,
}

/// Rendering-agnostic drawing instruction for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionOverlay {
    pub region_id: String,
    pub bounds: Rect,
    pub color: &'static str,
    pub label: String,
}

/// Map one region's facts to its status. A plate is only reported for an
/// occupied region.
pub fn classify_slot(
    region_id: &str,
    is_occupied: bool,
    is_illegal_zone: bool,
    plate: Option<&str>,
) -> RegionStatus {
    let status = match (is_illegal_zone, is_occupied) {
        (false, false) => StatusKind::Available,
        (false, true) => StatusKind::Occupied,
        (true, false) => StatusKind::IllegalZone,
        (true, true) => StatusKind::IllegalOccupied,
    };

    RegionStatus {
        region_id: region_id.to_string(),
        status,
        color: status.color(),
        plate: if is_occupied {
            plate.map(str::to_string)
        } else {
            None
        },
    }
}

pub struct StatusClassifier<'a> {
    slots: &'a SlotTracker,
    zones: &'a ZoneTracker,
}

impl<'a> StatusClassifier<'a> {
    pub fn new(slots: &'a SlotTracker, zones: &'a ZoneTracker) -> Self {
        Self { slots, zones }
    }

    pub fn get_all_statuses(&self) -> BTreeMap<String, RegionStatus> {
        let slot_statuses = self
            .slots
            .slots()
            .iter()
            .filter_map(|slot| self.slot_status(&slot.id));
        let zone_statuses = self
            .zones
            .zones()
            .iter()
            .filter_map(|zone| self.zone_status(&zone.id));

        slot_statuses
            .chain(zone_statuses)
            .map(|s| (s.region_id.clone(), s))
            .collect()
    }

    /// Status of a single region. Unknown ids are a caller/configuration error.
    pub fn status_of(&self, region_id: &str) -> Result<RegionStatus, EngineError> {
        self.slot_status(region_id)
            .or_else(|| self.zone_status(region_id))
            .ok_or_else(|| EngineError::UnknownRegion(region_id.to_string()))
    }

    pub fn get_statistics(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.get_all_statuses().values() {
            match status.status {
                StatusKind::Available => counts.available += 1,
                StatusKind::Occupied => counts.occupied += 1,
                StatusKind::IllegalZone => counts.illegal_zone += 1,
                StatusKind::IllegalOccupied => counts.illegal_occupied += 1,
            }
            counts.total += 1;
        }
        counts
    }

    pub fn overlays(&self) -> Vec<RegionOverlay> {
        let mut overlays = self.slots.overlays();
        overlays.extend(self.zones.overlays());
        overlays
    }

    fn slot_status(&self, slot_id: &str) -> Option<RegionStatus> {
        let is_occupied = self.slots.is_occupied(slot_id)?;
        let plate = self
            .slots
            .occupant(slot_id)
            .and_then(|o| o.plate.as_deref());
        Some(classify_slot(slot_id, is_occupied, false, plate))
    }

    fn zone_status(&self, zone_id: &str) -> Option<RegionStatus> {
        if !self.zones.zones().iter().any(|z| z.id == zone_id) {
            return None;
        }
        let occupant = self.zones.active_in_zone(zone_id);
        let plate = occupant.and_then(|o| o.plate.as_deref());
        Some(classify_slot(zone_id, occupant.is_some(), true, plate))
    }
}
