// src/tracking/slot_tracker.rs
//
// Per-slot occupancy state machine.
//
// Every frame, each detection is scored against each slot. A slot whose best
// candidate changes from nothing to something emits IN; from something to
// nothing emits OUT with a pro-rated fee.
//
// Policies callers can observe:
//   - Last detection wins. When several detections clear the threshold for the
//     same slot in one frame, the one evaluated last becomes the occupant. It is
//     not ranked by overlap.
//   - Hand-offs are silent. If one vehicle replaces another without an empty
//     frame in between, no OUT/IN pair is emitted and no fee is charged. These
//     are counted in `silent_handoffs` so the gap stays visible.
//   - One track may occupy several slots at once.

use super::classifier::{RegionOverlay, StatusKind};
use crate::geometry::overlap_ratio;
use crate::timestamp::{minutes_between, round2};
use crate::types::{
    Detection, EnrichmentMap, EventKind, OccupantRef, ParkingEvent, Slot, SlotStatus,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SlotTrackerConfig {
    pub overlap_threshold: f32,
    pub fee_per_hour: f64,
}

impl Default for SlotTrackerConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.40,
            fee_per_hour: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotState {
    pub status: SlotStatus,
    pub occupant: Option<OccupantRef>,
}

impl SlotState {
    fn occupied(occupant: OccupantRef) -> Self {
        Self {
            status: SlotStatus::Occupied,
            occupant: Some(occupant),
        }
    }
}

/// Result of one `update` call.
#[derive(Debug, Clone, Default)]
pub struct SlotUpdate {
    pub states: BTreeMap<String, SlotStatus>,
    pub occupants: BTreeMap<String, Option<OccupantRef>>,
    pub events: Vec<ParkingEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatistics {
    pub total_slots: usize,
    pub occupied: usize,
    pub available: usize,
    pub total_events: usize,
    pub total_revenue: f64,
    /// OUT events with no matching IN (engine restart or silent hand-off)
    pub orphan_exits: usize,
    /// OUT events whose timestamps could not be parsed
    pub untimed_exits: usize,
    pub silent_handoffs: usize,
}

pub struct SlotTracker {
    config: SlotTrackerConfig,
    slots: Vec<Slot>,
    states: HashMap<String, SlotState>,

    /// Append-only IN/OUT history
    events: Vec<ParkingEvent>,

    /// slot_id → index of the IN event that opened the current occupancy
    open_occupancy: HashMap<String, usize>,

    orphan_exits: usize,
    untimed_exits: usize,
    silent_handoffs: usize,
}

impl SlotTracker {
    pub fn new(slots: Vec<Slot>, config: SlotTrackerConfig) -> Self {
        let states = slots
            .iter()
            .map(|s| (s.id.clone(), SlotState::default()))
            .collect();

        info!("✓ Initialized {} parking slots", slots.len());

        Self {
            config,
            slots,
            states,
            events: Vec::new(),
            open_occupancy: HashMap::new(),
            orphan_exits: 0,
            untimed_exits: 0,
            silent_handoffs: 0,
        }
    }

    pub fn update(
        &mut self,
        detections: &[Detection],
        enrichment: &EnrichmentMap,
        timestamp: &str,
    ) -> SlotUpdate {
        let mut candidates: Vec<Option<OccupantRef>> = vec![None; self.slots.len()];

        for det in detections {
            for (idx, slot) in self.slots.iter().enumerate() {
                let overlap = overlap_ratio(&det.bbox, &slot.bounds);
                if overlap > self.config.overlap_threshold {
                    if let Some(previous) = &candidates[idx] {
                        debug!(
                            "Slot {}: track #{} replaces track #{} as candidate (last detection wins)",
                            slot.id, det.track_id, previous.track_id
                        );
                    }
                    candidates[idx] =
                        Some(OccupantRef::from_detection(det, enrichment.lookup(det.track_id)));
                }
            }
        }

        let mut events = Vec::new();
        for (idx, candidate) in candidates.into_iter().enumerate() {
            let slot_id = self.slots[idx].id.clone();
            let previous = self
                .states
                .get(&slot_id)
                .and_then(|state| state.occupant.clone());

            let next = match (previous, candidate) {
                (None, Some(new)) => {
                    let event = ParkingEvent::entry(&slot_id, &new, timestamp);
                    info!(
                        "🅿️  IN: slot {} ← {} #{} ({}) at {}",
                        slot_id,
                        new.class_name,
                        new.track_id,
                        event.plate_or_na(),
                        timestamp
                    );
                    self.open_occupancy.insert(slot_id.clone(), self.events.len());
                    self.events.push(event.clone());
                    events.push(event);
                    SlotState::occupied(new)
                }
                (Some(old), None) => {
                    let (duration_minutes, fee) = self.close_occupancy(&slot_id, &old, timestamp);
                    let event =
                        ParkingEvent::exit(&slot_id, &old, timestamp, duration_minutes, fee);
                    info!(
                        "🚗 OUT: slot {} → {} #{} ({}) after {:.2} min, fee {:.2}",
                        slot_id,
                        old.class_name,
                        old.track_id,
                        event.plate_or_na(),
                        duration_minutes,
                        fee
                    );
                    self.events.push(event.clone());
                    events.push(event);
                    SlotState::default()
                }
                (Some(old), Some(new)) => {
                    if old.track_id != new.track_id {
                        self.silent_handoffs += 1;
                        warn!(
                            "⚠️  Slot {}: track #{} replaced by #{} without an empty frame, no OUT/IN emitted",
                            slot_id, old.track_id, new.track_id
                        );
                    }
                    SlotState::occupied(new)
                }
                (None, None) => SlotState::default(),
            };

            self.states.insert(slot_id, next);
        }

        SlotUpdate {
            states: self
                .states
                .iter()
                .map(|(id, s)| (id.clone(), s.status))
                .collect(),
            occupants: self
                .states
                .iter()
                .map(|(id, s)| (id.clone(), s.occupant.clone()))
                .collect(),
            events,
        }
    }

    /// Duration and fee for an occupant leaving `slot_id`. Both are zero when the
    /// entry cannot be found or the timestamps cannot be parsed.
    fn close_occupancy(
        &mut self,
        slot_id: &str,
        occupant: &OccupantRef,
        exit_timestamp: &str,
    ) -> (f64, f64) {
        let entry_timestamp = self
            .open_occupancy
            .remove(slot_id)
            .and_then(|idx| self.events.get(idx))
            .filter(|entry| entry.kind == EventKind::In && entry.track_id == occupant.track_id)
            .map(|entry| entry.timestamp.clone());

        let Some(entry_timestamp) = entry_timestamp else {
            self.orphan_exits += 1;
            warn!(
                "⚠️  Slot {}: no IN event found for track #{}, duration and fee set to 0",
                slot_id, occupant.track_id
            );
            return (0.0, 0.0);
        };

        match minutes_between(&entry_timestamp, exit_timestamp) {
            Some(minutes) => {
                let minutes = minutes.max(0.0);
                let fee = minutes / 60.0 * self.config.fee_per_hour;
                (round2(minutes), round2(fee))
            }
            None => {
                self.untimed_exits += 1;
                warn!(
                    "⚠️  Slot {}: cannot parse timestamps {:?} → {:?}, duration and fee set to 0",
                    slot_id, entry_timestamp, exit_timestamp
                );
                (0.0, 0.0)
            }
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn state(&self, slot_id: &str) -> Option<&SlotState> {
        self.states.get(slot_id)
    }

    pub fn is_occupied(&self, slot_id: &str) -> Option<bool> {
        self.states
            .get(slot_id)
            .map(|s| s.status == SlotStatus::Occupied)
    }

    pub fn occupant(&self, slot_id: &str) -> Option<&OccupantRef> {
        self.states.get(slot_id).and_then(|s| s.occupant.as_ref())
    }

    pub fn events(&self) -> &[ParkingEvent] {
        &self.events
    }

    pub fn get_statistics(&self) -> SlotStatistics {
        let total_slots = self.slots.len();
        let occupied = self
            .states
            .values()
            .filter(|s| s.status == SlotStatus::Occupied)
            .count();
        let total_revenue: f64 = self
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Out)
            .filter_map(|e| e.fee)
            .sum();

        SlotStatistics {
            total_slots,
            occupied,
            available: total_slots - occupied,
            total_events: self.events.len(),
            total_revenue: round2(total_revenue),
            orphan_exits: self.orphan_exits,
            untimed_exits: self.untimed_exits,
            silent_handoffs: self.silent_handoffs,
        }
    }

    /// Drawing instructions for every slot, e.g. `A1: OCCUPIED | BP-1-A1111`.
    pub fn overlays(&self) -> Vec<RegionOverlay> {
        self.slots
            .iter()
            .map(|slot| {
                let state = self.state(&slot.id).cloned().unwrap_or_default();
                let kind = match state.status {
                    SlotStatus::Occupied => StatusKind::Occupied,
                    SlotStatus::Available => StatusKind::Available,
                };
                let mut label = format!("{}: {}", slot.id, state.status.as_str());
                if let Some(plate) = state.occupant.as_ref().and_then(|o| o.plate.as_deref()) {
                    label.push_str(" | ");
                    label.push_str(plate);
                }
                RegionOverlay {
                    region_id: slot.id.clone(),
                    bounds: slot.bounds,
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
    use crate::types::{Enrichment, Rect, Region, TrackId};

    fn det(track_id: TrackId, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            track_id,
            class_name: "car".to_string(),
            bbox: Rect::new(x1, y1, x2, y2),
            confidence: 0.9,
        }
    }

    fn single_slot_tracker() -> SlotTracker {
        SlotTracker::new(
            vec![Region::new("S1", Rect::new(0.0, 0.0, 100.0, 100.0))],
            SlotTrackerConfig::default(),
        )
    }

    fn count(tracker: &SlotTracker, slot_id: &str, kind: EventKind) -> usize {
        tracker
            .events()
            .iter()
            .filter(|e| e.slot_id == slot_id && e.kind == kind)
            .count()
    }

    #[test]
    fn test_entry_then_exit_charges_fee() {
        let mut tracker = single_slot_tracker();
        let none = EnrichmentMap::new();

        let update = tracker.update(&[det(7, 10.0, 10.0, 90.0, 90.0)], &none, "2024-05-01 10:00:00");
        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].kind, EventKind::In);
        assert_eq!(update.events[0].track_id, 7);
        assert_eq!(update.states["S1"], SlotStatus::Occupied);

        let update = tracker.update(&[], &none, "2024-05-01 10:30:00");
        assert_eq!(update.events.len(), 1);
        let out = &update.events[0];
        assert_eq!(out.kind, EventKind::Out);
        assert_eq!(out.duration_minutes, Some(30.0));
        assert_eq!(out.fee, Some(20.0));
        assert_eq!(update.states["S1"], SlotStatus::Available);
        assert_eq!(tracker.get_statistics().total_revenue, 20.0);
    }

    #[test]
    fn test_last_detection_wins_tie_break() {
        let mut tracker = single_slot_tracker();
        let dets = vec![det(1, 0.0, 0.0, 100.0, 100.0), det(2, 10.0, 10.0, 90.0, 90.0)];

        let update = tracker.update(&dets, &EnrichmentMap::new(), "2024-05-01 10:00:00");

        assert_eq!(update.events.len(), 1, "only one occupant per slot");
        assert_eq!(tracker.occupant("S1").map(|o| o.track_id), Some(2));
    }

    #[test]
    fn test_below_threshold_does_not_occupy() {
        let mut tracker = single_slot_tracker();
        // IoU = 2500 / 10000 = 0.25
        let update = tracker.update(
            &[det(3, 0.0, 0.0, 50.0, 50.0)],
            &EnrichmentMap::new(),
            "2024-05-01 10:00:00",
        );
        assert!(update.events.is_empty());
        assert_eq!(tracker.is_occupied("S1"), Some(false));
    }

    #[test]
    fn test_enrichment_carried_on_events() {
        let mut tracker = single_slot_tracker();
        let enrichment: EnrichmentMap = [(
            7,
            Enrichment {
                plate: Some("BP-1-A1111".to_string()),
                vehicle_type: Some("Private".to_string()),
                region_name: Some("Western".to_string()),
            },
        )]
        .into_iter()
        .collect();

        tracker.update(&[det(7, 5.0, 5.0, 95.0, 95.0)], &enrichment, "2024-05-01 10:00:00");
        let update = tracker.update(&[], &enrichment, "2024-05-01 10:06:00");

        let out = &update.events[0];
        assert_eq!(out.plate.as_deref(), Some("BP-1-A1111"));
        assert_eq!(out.vehicle_type.as_deref(), Some("Private"));
        assert_eq!(out.region_name.as_deref(), Some("Western"));
        assert_eq!(out.duration_minutes, Some(6.0));
        assert_eq!(out.fee, Some(4.0));
    }

    #[test]
    fn test_silent_handoff_keeps_single_occupancy() {
        let mut tracker = single_slot_tracker();
        let none = EnrichmentMap::new();

        tracker.update(&[det(1, 5.0, 5.0, 95.0, 95.0)], &none, "2024-05-01 10:00:00");
        let update = tracker.update(&[det(2, 5.0, 5.0, 95.0, 95.0)], &none, "2024-05-01 10:10:00");
        assert!(update.events.is_empty(), "hand-off emits nothing");
        assert_eq!(tracker.occupant("S1").map(|o| o.track_id), Some(2));

        // Track 2 leaves: its IN never happened, so the exit is an orphan
        let update = tracker.update(&[], &none, "2024-05-01 10:20:00");
        assert_eq!(update.events[0].track_id, 2);
        assert_eq!(update.events[0].fee, Some(0.0));

        let stats = tracker.get_statistics();
        assert_eq!(stats.silent_handoffs, 1);
        assert_eq!(stats.orphan_exits, 1);
    }

    #[test]
    fn test_unparseable_timestamp_still_emits_exit() {
        let mut tracker = single_slot_tracker();
        let none = EnrichmentMap::new();

        tracker.update(&[det(4, 5.0, 5.0, 95.0, 95.0)], &none, "not a time");
        let update = tracker.update(&[], &none, "2024-05-01 10:20:00");

        assert_eq!(update.events.len(), 1);
        assert_eq!(update.events[0].duration_minutes, Some(0.0));
        assert_eq!(update.events[0].fee, Some(0.0));
        assert_eq!(tracker.get_statistics().untimed_exits, 1);
    }

    #[test]
    fn test_exit_before_entry_clamps_to_zero() {
        let mut tracker = single_slot_tracker();
        let none = EnrichmentMap::new();

        tracker.update(&[det(4, 5.0, 5.0, 95.0, 95.0)], &none, "2024-05-01 10:30:00");
        let update = tracker.update(&[], &none, "2024-05-01 10:00:00");

        let out = &update.events[0];
        assert_eq!(out.kind, EventKind::Out);
        assert_eq!(out.duration_minutes, Some(0.0), "negative duration not clamped");
        assert_eq!(out.fee, Some(0.0));
        let stats = tracker.get_statistics();
        assert_eq!(stats.untimed_exits, 0, "timestamps were readable");
        assert_eq!(stats.orphan_exits, 0);
    }

    #[test]
    fn test_state_reports_status_and_occupant() {
        let mut tracker = single_slot_tracker();
        assert_eq!(tracker.state("S1"), Some(&SlotState::default()));
        assert!(tracker.state("S9").is_none());

        tracker.update(
            &[det(3, 5.0, 5.0, 95.0, 95.0)],
            &EnrichmentMap::new(),
            "2024-05-01 10:00:00",
        );
        let state = tracker.state("S1").unwrap();
        assert_eq!(state.status, SlotStatus::Occupied);
        assert_eq!(state.status.as_str(), "OCCUPIED");
        assert_eq!(state.occupant.as_ref().map(|o| o.track_id), Some(3));
    }

    #[test]
    fn test_one_track_can_occupy_two_slots() {
        let mut tracker = SlotTracker::new(
            vec![
                Region::new("A1", Rect::new(0.0, 0.0, 100.0, 100.0)),
                Region::new("A2", Rect::new(10.0, 0.0, 110.0, 100.0)),
            ],
            SlotTrackerConfig::default(),
        );
        let update = tracker.update(
            &[det(5, 5.0, 0.0, 105.0, 100.0)],
            &EnrichmentMap::new(),
            "2024-05-01 10:00:00",
        );
        assert_eq!(update.events.len(), 2);
        assert_eq!(tracker.get_statistics().occupied, 2);
    }

    #[test]
    fn test_in_out_balance_over_random_walk() {
        let mut tracker = single_slot_tracker();
        let none = EnrichmentMap::new();
        // Presence pattern with gaps, re-entries and a hand-off
        let pattern: [Option<TrackId>; 12] = [
            Some(1), Some(1), None, Some(2), Some(3), None, None, Some(4), None, Some(5), Some(5), Some(6),
        ];
        for (minute, present) in pattern.iter().enumerate() {
            let ts = format!("2024-05-01 10:{:02}:00", minute);
            let dets: Vec<Detection> = present
                .map(|id| det(id, 5.0, 5.0, 95.0, 95.0))
                .into_iter()
                .collect();
            tracker.update(&dets, &none, &ts);

            let ins = count(&tracker, "S1", EventKind::In);
            let outs = count(&tracker, "S1", EventKind::Out);
            let occupied = usize::from(tracker.is_occupied("S1") == Some(true));
            assert_eq!(ins, outs + occupied, "balance broken at minute {}", minute);
        }
    }

    #[test]
    fn test_fee_non_decreasing_with_duration() {
        let mut previous = -1.0;
        for minutes in [0u32, 1, 15, 29, 30, 59, 61, 125] {
            let mut tracker = single_slot_tracker();
            let none = EnrichmentMap::new();
            tracker.update(&[det(1, 5.0, 5.0, 95.0, 95.0)], &none, "2024-05-01 08:00:00");
            let exit = format!("2024-05-01 {:02}:{:02}:00", 8 + minutes / 60, minutes % 60);
            let update = tracker.update(&[], &none, &exit);
            let fee = update.events[0].fee.unwrap_or_default();
            assert!(fee >= previous, "fee dropped at {} minutes", minutes);
            previous = fee;
        }
    }

    #[test]
    fn test_overlay_labels() {
        let mut tracker = single_slot_tracker();
        let enrichment: EnrichmentMap = [(
            9,
            Enrichment {
                plate: Some("BT-2-C42".to_string()),
                ..Enrichment::default()
            },
        )]
        .into_iter()
        .collect();

        assert_eq!(tracker.overlays()[0].label, "S1: AVAILABLE");
        tracker.update(&[det(9, 5.0, 5.0, 95.0, 95.0)], &enrichment, "2024-05-01 10:00:00");
        let overlay = &tracker.overlays()[0];
        assert_eq!(overlay.label, "S1: OCCUPIED | BT-2-C42");
        assert_eq!(overlay.color, StatusKind::Occupied.color());
    }
}
