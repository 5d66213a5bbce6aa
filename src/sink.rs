// src/sink.rs
//
// Event sinks. Each sink receives every parking event and violation exactly
// once, in the order the engine produced them. Sinks append only.

use crate::pipeline::PipelineEvent;
use crate::types::{EventKind, ParkingEvent};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

pub trait EventSink {
    fn name(&self) -> &str;

    fn record(&mut self, event: &PipelineEvent) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// CSV PARKING LOG
// ============================================================================

pub const CSV_HEADER: [&str; 8] = [
    "SlotID",
    "Event",
    "Plate",
    "VehicleType",
    "Region",
    "Timestamp",
    "DurationMinutes",
    "Fee",
];

/// Tabular IN/OUT log. Violations are not part of this log.
pub struct CsvEventLog<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvEventLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create parking log {}", path.display()))?;
        info!("💾 Parking log will be written to: {}", path.display());
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvEventLog<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer
            .write_record(CSV_HEADER)
            .context("Failed to write parking log header")?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush parking log: {}", e.error()))
    }

    fn write_parking(&mut self, event: &ParkingEvent) -> Result<()> {
        let (duration, fee) = match event.kind {
            EventKind::In => (String::new(), String::new()),
            EventKind::Out => (
                event.duration_minutes.map(|d| format!("{:.2}", d)).unwrap_or_default(),
                event.fee.map(|f| format!("{:.2}", f)).unwrap_or_default(),
            ),
        };

        self.writer.write_record([
            event.slot_id.as_str(),
            event.kind.as_str(),
            event.plate.as_deref().unwrap_or(""),
            event.vehicle_type.as_deref().unwrap_or(""),
            event.region_name.as_deref().unwrap_or(""),
            event.timestamp.as_str(),
            duration.as_str(),
            fee.as_str(),
        ])?;
        self.rows += 1;
        Ok(())
    }
}

impl<W: Write> EventSink for CsvEventLog<W> {
    fn name(&self) -> &str {
        "csv"
    }

    fn record(&mut self, event: &PipelineEvent) -> Result<()> {
        match event {
            PipelineEvent::Parking(parking) => self.write_parking(parking),
            PipelineEvent::Violation(v) => {
                debug!("CSV log skips violation in zone {}", v.zone_id);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush parking log")
    }
}

// ============================================================================
// JSONL EVENT LOG
// ============================================================================

/// Every event, one JSON object per line, tagged with `"type"`.
pub struct JsonlEventLog<W: Write> {
    writer: W,
    lines: usize,
}

impl JsonlEventLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        info!("💾 Events will be written to: {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlEventLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, lines: 0 }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonlEventLog<W> {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn record(&mut self, event: &PipelineEvent) -> Result<()> {
        let json_line = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", json_line)?;
        self.lines += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<PipelineEvent>,
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn record(&mut self, event: &PipelineEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
