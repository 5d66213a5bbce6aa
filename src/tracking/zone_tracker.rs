// src/tracking/zone_tracker.rs
//
// Illegal-zone violation tracker.
//
// Violations are edge-triggered: a record is appended only when a track that
// was not violating in the previous frame starts violating. The active set is
// rebuilt from scratch every frame, so a vehicle that leaves and comes back
// produces a second record (one record per illegal-parking episode).

use super::classifier::{RegionOverlay, StatusKind};
use crate::geometry::overlap_ratio;
use crate::types::{Detection, EnrichmentMap, OccupantRef, TrackId, Violation, Zone};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ZoneTrackerConfig {
    pub overlap_threshold: f32,
}

impl Default for ZoneTrackerConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatistics {
    pub total_zones: usize,
    pub total_violations: usize,
    pub active_violators: usize,
}

pub struct ZoneTracker {
    config: ZoneTrackerConfig,
    zones: Vec<Zone>,

    /// Every episode ever recorded, in order
    violations: Vec<Violation>,

    /// Track ids violating as of the latest frame
    active_violators: HashSet<TrackId>,

    /// zone_id → last qualifying detection of the latest frame
    zone_occupants: HashMap<String, OccupantRef>,
}

impl ZoneTracker {
    pub fn new(zones: Vec<Zone>, config: ZoneTrackerConfig) -> Self {
        info!("✓ Initialized {} illegal parking zones", zones.len());
        Self {
            config,
            zones,
            violations: Vec::new(),
            active_violators: HashSet::new(),
            zone_occupants: HashMap::new(),
        }
    }

    pub fn detect(
        &mut self,
        detections: &[Detection],
        enrichment: &EnrichmentMap,
        frame_number: u64,
        timestamp: &str,
    ) -> Vec<Violation> {
        let mut current_violators = HashSet::new();
        let mut zone_occupants = HashMap::new();
        let mut new_violations = Vec::new();

        for det in detections {
            for zone in &self.zones {
                let overlap = overlap_ratio(&det.bbox, &zone.bounds);
                if overlap <= self.config.overlap_threshold {
                    continue;
                }

                current_violators.insert(det.track_id);
                let occupant = OccupantRef::from_detection(det, enrichment.lookup(det.track_id));

                if !self.active_violators.contains(&det.track_id) {
                    let violation = Violation {
                        zone_id: zone.id.clone(),
                        track_id: det.track_id,
                        class_name: det.class_name.clone(),
                        plate: occupant.plate.clone(),
                        vehicle_type: occupant.vehicle_type.clone(),
                        region_name: occupant.region_name.clone(),
                        timestamp: timestamp.to_string(),
                        frame_number,
                        bbox: det.bbox,
                    };
                    warn!(
                        "🚫 ILLEGAL PARKING: {} #{} ({}) in zone {} at frame {} (overlap {:.2})",
                        det.class_name,
                        det.track_id,
                        violation.plate_or_na(),
                        zone.id,
                        frame_number,
                        overlap
                    );
                    new_violations.push(violation);
                }

                zone_occupants.insert(zone.id.clone(), occupant);
            }
        }

        let cleared = self
            .active_violators
            .difference(&current_violators)
            .count();
        if cleared > 0 {
            debug!("{} violator(s) left their zones at frame {}", cleared, frame_number);
        }

        self.violations.extend(new_violations.iter().cloned());
        self.active_violators = current_violators;
        self.zone_occupants = zone_occupants;

        new_violations
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn active_violators(&self) -> &HashSet<TrackId> {
        &self.active_violators
    }

    pub fn is_violating(&self, track_id: TrackId) -> bool {
        self.active_violators.contains(&track_id)
    }

    /// Who is parked in `zone_id` as of the latest frame.
    pub fn active_in_zone(&self, zone_id: &str) -> Option<&OccupantRef> {
        self.zone_occupants.get(zone_id)
    }

    pub fn get_statistics(&self) -> ZoneStatistics {
        ZoneStatistics {
            total_zones: self.zones.len(),
            total_violations: self.violations.len(),
            active_violators: self.active_violators.len(),
        }
    }

    /// Drawing instructions for every zone, e.g. `⚠ A3: ILLEGAL ZONE`.
    pub fn overlays(&self) -> Vec<RegionOverlay> {
        self.zones
            .iter()
            .map(|zone| {
                let occupant = self.active_in_zone(&zone.id);
                let (kind, label) = match occupant {
                    Some(o) => (
                        StatusKind::IllegalOccupied,
                        format!(
                            "⚠ {}: ILLEGAL PARKING | {}",
                            zone.id,
                            o.plate.as_deref().unwrap_or(&o.class_name)
                        ),
                    ),
                    None => (
                        StatusKind::IllegalZone,
                        format!("⚠ {}: ILLEGAL ZONE", zone.id),
                    ),
                };
                RegionOverlay {
                    region_id: zone.id.clone(),
                    bounds: zone.bounds,
                    color: kind.color(),
                    label,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Enrichment, Rect, Region};

    fn det(track_id: TrackId, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            track_id,
            class_name: "car".to_string(),
            bbox: Rect::new(x1, y1, x2, y2),
            confidence: 0.8,
        }
    }

    fn zone_tracker() -> ZoneTracker {
        ZoneTracker::new(
            vec![Region::new("Z1", Rect::new(0.0, 0.0, 50.0, 50.0))],
            ZoneTrackerConfig::default(),
        )
    }

    /// IoU with Z1 = 1250 / 2500 = 0.5
    fn half_in(track_id: TrackId) -> Detection {
        det(track_id, 0.0, 0.0, 50.0, 25.0)
    }

    #[test]
    fn test_violation_episodes_are_edge_triggered() {
        let mut tracker = zone_tracker();
        let none = EnrichmentMap::new();

        let v = tracker.detect(&[half_in(9)], &none, 1, "2024-05-01 10:00:00");
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].frame_number, 1);
        assert!(tracker.is_violating(9));

        let v = tracker.detect(&[half_in(9)], &none, 2, "2024-05-01 10:00:01");
        assert!(v.is_empty(), "still parked, no new record");
        assert_eq!(tracker.active_violators().len(), 1);

        let v = tracker.detect(&[], &none, 3, "2024-05-01 10:00:02");
        assert!(v.is_empty());
        assert!(tracker.active_violators().is_empty());

        let v = tracker.detect(&[half_in(9)], &none, 4, "2024-05-01 10:00:03");
        assert_eq!(v.len(), 1, "re-entry is a new episode");
        assert_eq!(tracker.violations().len(), 2);
        assert_eq!(
            tracker.get_statistics(),
            ZoneStatistics {
                total_zones: 1,
                total_violations: 2,
                active_violators: 1,
            }
        );
    }

    #[test]
    fn test_one_detection_two_zones_yields_two_records() {
        let mut tracker = ZoneTracker::new(
            vec![
                Region::new("Z1", Rect::new(0.0, 0.0, 100.0, 100.0)),
                Region::new("Z2", Rect::new(10.0, 0.0, 110.0, 100.0)),
            ],
            ZoneTrackerConfig::default(),
        );
        let v = tracker.detect(
            &[det(4, 5.0, 0.0, 105.0, 100.0)],
            &EnrichmentMap::new(),
            1,
            "2024-05-01 10:00:00",
        );
        assert_eq!(v.len(), 2);
        assert_eq!(tracker.active_violators().len(), 1, "track counted once");
    }

    #[test]
    fn test_violation_carries_plate_when_known() {
        let mut tracker = zone_tracker();
        let enrichment: EnrichmentMap = [(
            9,
            Enrichment {
                plate: Some("BP-1-A1111".to_string()),
                vehicle_type: Some("Private".to_string()),
                region_name: None,
            },
        )]
        .into_iter()
        .collect();

        let v = tracker.detect(&[half_in(9)], &enrichment, 1, "2024-05-01 10:00:00");
        assert_eq!(v[0].plate.as_deref(), Some("BP-1-A1111"));
        assert_eq!(v[0].bbox, Rect::new(0.0, 0.0, 50.0, 25.0));
        assert_eq!(
            tracker.active_in_zone("Z1").and_then(|o| o.plate.as_deref()),
            Some("BP-1-A1111")
        );
    }

    #[test]
    fn test_below_threshold_is_not_a_violation() {
        let mut tracker = zone_tracker();
        // IoU = 625 / 2500 = 0.25
        let v = tracker.detect(
            &[det(2, 0.0, 0.0, 25.0, 25.0)],
            &EnrichmentMap::new(),
            1,
            "2024-05-01 10:00:00",
        );
        assert!(v.is_empty());
        assert!(tracker.active_in_zone("Z1").is_none());
    }

    #[test]
    fn test_zone_occupant_cleared_when_vehicle_leaves() {
        let mut tracker = zone_tracker();
        let none = EnrichmentMap::new();
        tracker.detect(&[half_in(1)], &none, 1, "2024-05-01 10:00:00");
        assert_eq!(tracker.overlays()[0].label, "⚠ Z1: ILLEGAL PARKING | car");

        tracker.detect(&[], &none, 2, "2024-05-01 10:00:01");
        assert!(tracker.active_in_zone("Z1").is_none());
        assert_eq!(tracker.overlays()[0].label, "⚠ Z1: ILLEGAL ZONE");
    }
}
