// src/pipeline/mod.rs

pub mod engine;
pub mod event_bus;
pub mod frame_context;
pub mod metrics;

pub use engine::{EngineHandle, EngineStatistics, ParkingEngine};
pub use event_bus::{EventBus, PipelineEvent};
pub use frame_context::{FrameInput, FrameOutput, StatusSnapshot};
pub use metrics::{MetricsSummary, PipelineMetrics};
