// src/pipeline/engine.rs
//
// Frame-by-frame driver for the two trackers.
//
// Writer side: one `ParkingEngine` owned by the frame loop. Each frame takes the
// slot lock for one `update`, then the zone lock for one `detect`, never both
// at once. Readers clone an `EngineHandle` and take both read locks (always
// slots first) for the duration of one classification. A reader may therefore
// see slots from frame N alongside zones from frame N-1; every individual
// tracker read is still consistent.

use super::event_bus::{EventBus, PipelineEvent};
use super::frame_context::{FrameInput, FrameOutput, StatusSnapshot};
use super::metrics::PipelineMetrics;
use crate::error::EngineError;
use crate::sink::EventSink;
use crate::tracking::{
    RegionStatus, SlotStatistics, SlotTracker, SlotTrackerConfig, StatusClassifier, StatusCounts,
    ZoneStatistics, ZoneTracker, ZoneTrackerConfig,
};
use crate::types::{EnrichmentMap, EventKind, RegionSet, TrackId, TrackingConfig};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatistics {
    pub slots: SlotStatistics,
    pub zones: ZoneStatistics,
    pub statuses: StatusCounts,
}

/// Read-only view of the engine, safe to share across threads.
#[derive(Clone)]
pub struct EngineHandle {
    slots: Arc<RwLock<SlotTracker>>,
    zones: Arc<RwLock<ZoneTracker>>,
}

impl EngineHandle {
    pub fn get_all_statuses(&self) -> BTreeMap<String, RegionStatus> {
        let slots = read(&self.slots);
        let zones = read(&self.zones);
        StatusClassifier::new(&slots, &zones).get_all_statuses()
    }

    pub fn status_of(&self, region_id: &str) -> Result<RegionStatus, EngineError> {
        let slots = read(&self.slots);
        let zones = read(&self.zones);
        StatusClassifier::new(&slots, &zones).status_of(region_id)
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        let slots = read(&self.slots);
        let zones = read(&self.zones);
        EngineStatistics {
            slots: slots.get_statistics(),
            zones: zones.get_statistics(),
            statuses: StatusClassifier::new(&slots, &zones).get_statistics(),
        }
    }

    pub fn snapshot(&self, frame_number: u64) -> StatusSnapshot {
        let slots = read(&self.slots);
        let zones = read(&self.zones);
        let classifier = StatusClassifier::new(&slots, &zones);
        StatusSnapshot {
            frame_number,
            statuses: classifier.get_all_statuses(),
            counts: classifier.get_statistics(),
        }
    }
}

pub struct ParkingEngine {
    config: TrackingConfig,
    handle: EngineHandle,
    bus: EventBus,
    metrics: PipelineMetrics,
    seen_tracks: HashSet<TrackId>,
    last_frame: u64,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl ParkingEngine {
    pub fn new(regions: RegionSet, config: &TrackingConfig) -> Result<Self, EngineError> {
        validate_regions(&regions)?;

        let handle = EngineHandle {
            slots: Arc::new(RwLock::new(SlotTracker::new(
                regions.slots,
                slot_config(config),
            ))),
            zones: Arc::new(RwLock::new(ZoneTracker::new(
                regions.zones,
                zone_config(config),
            ))),
        };
        let (status_tx, _) = watch::channel(handle.snapshot(0));

        Ok(Self {
            config: config.clone(),
            handle,
            bus: EventBus::new(config.event_bus_capacity),
            metrics: PipelineMetrics::new(),
            seen_tracks: HashSet::new(),
            last_frame: 0,
            status_tx,
        })
    }

    /// Feed one frame to both trackers. Events are returned and also queued on
    /// the bus for `forward`.
    pub fn process_frame(&mut self, frame: &FrameInput, enrichment: &EnrichmentMap) -> FrameOutput {
        let start = Instant::now();
        self.metrics.inc(&self.metrics.total_frames);
        if frame.has_vehicles() {
            self.metrics.inc(&self.metrics.frames_with_vehicles);
        }

        let update = write(&self.handle.slots).update(&frame.detections, enrichment, &frame.timestamp);
        let violations = write(&self.handle.zones).detect(
            &frame.detections,
            enrichment,
            frame.frame_number,
            &frame.timestamp,
        );

        for track_id in frame.track_ids() {
            if self.seen_tracks.insert(track_id) {
                debug!("New vehicle track #{} at frame {}", track_id, frame.frame_number);
            }
        }
        self.metrics
            .set(&self.metrics.unique_vehicles, self.seen_tracks.len() as u64);

        for event in &update.events {
            match event.kind {
                EventKind::In => self.metrics.inc(&self.metrics.parking_entries),
                EventKind::Out => self.metrics.inc(&self.metrics.parking_exits),
            }
            self.publish(PipelineEvent::Parking(event.clone()));
        }
        self.metrics
            .add(&self.metrics.violations, violations.len() as u64);
        for violation in &violations {
            self.publish(PipelineEvent::Violation(violation.clone()));
        }

        self.last_frame = frame.frame_number;
        self.status_tx
            .send_replace(self.handle.snapshot(frame.frame_number));

        self.metrics.set(
            &self.metrics.frame_time_us,
            start.elapsed().as_micros() as u64,
        );

        FrameOutput {
            frame_number: frame.frame_number,
            events: update.events,
            violations,
        }
    }

    fn publish(&mut self, event: PipelineEvent) {
        if let Some(evicted) = self.bus.publish(event) {
            self.metrics.inc(&self.metrics.dropped_events);
            warn!(
                "⚠️  Event bus full ({} pending), dropped undelivered {} event",
                self.bus.capacity(),
                match evicted {
                    PipelineEvent::Parking(_) => "parking",
                    PipelineEvent::Violation(_) => "violation",
                }
            );
        }
    }

    /// Count a frame the caller chose not to feed to the trackers.
    pub fn skip_frame(&self, frame_number: u64) {
        debug!("Skipping frame {} (no detections)", frame_number);
        self.metrics.inc(&self.metrics.skipped_frames);
    }

    /// Deliver every pending bus event to each sink, in publish order.
    pub fn forward(&mut self, sinks: &mut [&mut dyn EventSink]) -> Result<usize> {
        let events = self.bus.take_all();
        for sink in sinks.iter_mut() {
            for event in &events {
                sink.record(event)
                    .with_context(|| format!("Sink '{}' failed to record event", sink.name()))?;
            }
            sink.flush()
                .with_context(|| format!("Sink '{}' failed to flush", sink.name()))?;
        }
        Ok(events.len())
    }

    /// Replace every slot and zone. All occupancy, history and violation state
    /// is discarded; the engine starts fresh on the new layout.
    pub fn recalibrate(&mut self, regions: RegionSet) -> Result<(), EngineError> {
        validate_regions(&regions)?;

        let (slot_count, zone_count) = (regions.slots.len(), regions.zones.len());
        *write(&self.handle.slots) = SlotTracker::new(regions.slots, slot_config(&self.config));
        *write(&self.handle.zones) = ZoneTracker::new(regions.zones, zone_config(&self.config));

        self.metrics.inc(&self.metrics.recalibrations);
        self.status_tx
            .send_replace(self.handle.snapshot(self.last_frame));

        info!(
            "🔧 Recalibrated: {} parking slots, {} illegal zones",
            slot_count, zone_count
        );
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn pending_events(&self) -> usize {
        self.bus.len()
    }

    pub fn unique_vehicles(&self) -> usize {
        self.seen_tracks.len()
    }
}

fn slot_config(config: &TrackingConfig) -> SlotTrackerConfig {
    SlotTrackerConfig {
        overlap_threshold: config.slot_overlap_threshold,
        fee_per_hour: config.fee_per_hour,
    }
}

fn zone_config(config: &TrackingConfig) -> ZoneTrackerConfig {
    ZoneTrackerConfig {
        overlap_threshold: config.zone_overlap_threshold,
    }
}

/// Region ids must be unique across slots and zones, since statuses are keyed by id.
fn validate_regions(regions: &RegionSet) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for region in regions.slots.iter().chain(regions.zones.iter()) {
        if !seen.insert(region.id.as_str()) {
            return Err(EngineError::DuplicateRegion(region.id.clone()));
        }
    }
    Ok(())
}

// A panicking writer leaves the previous frame's state in place, which is
// still a complete snapshot.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
