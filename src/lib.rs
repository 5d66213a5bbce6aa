// src/lib.rs
//
// Parking occupancy & illegal-parking tracking engine.
//
// Per-frame vehicle detections (already tracked, with stable track ids) go in;
// slot IN/OUT events with fees, illegal-zone violations and a classified status
// per region come out.

pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod plate;
pub mod replay;
pub mod report;
pub mod sink;
pub mod timestamp;
pub mod tracking;
pub mod types;

pub use error::EngineError;
pub use pipeline::{EngineHandle, FrameInput, FrameOutput, ParkingEngine, PipelineEvent};
pub use sink::EventSink;
pub use types::{Detection, Enrichment, EnrichmentMap, ParkingEvent, Rect, Region, RegionSet, Violation};
