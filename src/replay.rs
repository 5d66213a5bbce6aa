// src/replay.rs
//
// Recorded detection logs (one JSON frame per line) standing in for the live
// detector + tracker. Frames come back in file order.

use crate::plate::enrichment_from_plate;
use crate::types::{Detection, EnrichmentMap, InputConfig, TrackId};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedFrame {
    pub frame_number: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Raw plate-reader text keyed by track id
    #[serde(default)]
    pub plates: HashMap<TrackId, String>,
}

pub struct DetectionReplay {
    input_dir: PathBuf,
}

impl DetectionReplay {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            input_dir: PathBuf::from(&config.input_dir),
        }
    }

    pub fn find_logs(&self) -> Result<Vec<PathBuf>> {
        let mut logs: Vec<PathBuf> = WalkDir::new(&self.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
            })
            .collect();
        logs.sort();

        info!("Found {} detection log(s)", logs.len());
        Ok(logs)
    }

    pub fn open(&self, path: &Path) -> Result<FrameReader<BufReader<File>>> {
        info!("Opening detection log: {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("Failed to open detection log {}", path.display()))?;
        Ok(FrameReader::new(BufReader::new(file)))
    }
}

pub struct FrameReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<RecordedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("Failed to read line {}", self.line_number)),
                    )
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&line)
                    .with_context(|| format!("Malformed frame on line {}", self.line_number)),
            );
        }
    }
}

/// Per-session plate cache. The first readable plate seen for a track sticks
/// for the rest of the session.
#[derive(Debug, Default)]
pub struct PlateCache {
    enrichment: EnrichmentMap,
}

impl PlateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, plates: &HashMap<TrackId, String>) {
        for (&track_id, raw) in plates {
            if self.enrichment.contains(track_id) {
                continue;
            }
            match enrichment_from_plate(raw) {
                Some(enrichment) => {
                    info!(
                        "🔖 Track #{} plate: {}",
                        track_id,
                        enrichment.plate.as_deref().unwrap_or(raw)
                    );
                    self.enrichment.insert(track_id, enrichment);
                }
                None => debug!("Track #{}: unreadable plate text {:?}", track_id, raw),
            }
        }
    }

    pub fn enrichment(&self) -> &EnrichmentMap {
        &self.enrichment
    }
}
