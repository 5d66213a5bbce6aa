// src/config.rs

use crate::types::{Config, Rect, RegionSet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }

    /// Slot/zone layout for this session: the calibration file when it can be
    /// read, otherwise the regions embedded in the config.
    pub fn resolve_regions(&self) -> RegionSet {
        match Calibration::load(&self.calibration.path) {
            Ok(calibration) => {
                info!(
                    "✓ Calibration loaded from {} ({} slots, {} zones)",
                    self.calibration.path,
                    calibration.parking_slots.len(),
                    calibration.illegal_zones.len()
                );
                calibration.into_regions()
            }
            Err(e) => {
                warn!(
                    "⚠️  Calibration unavailable ({:#}), using default regions from config",
                    e
                );
                RegionSet::from_maps(&self.regions.parking_slots, &self.regions.illegal_zones)
            }
        }
    }
}

/// Calibration file written by the slot-marking tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub parking_slots: BTreeMap<String, Rect>,
    #[serde(default)]
    pub illegal_zones: BTreeMap<String, Rect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<String>,
}

impl Calibration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calibration {}", path.display()))?;
        let calibration: Calibration = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse calibration {}", path.display()))?;
        Ok(calibration)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write calibration {}", path.display()))?;
        info!("💾 Calibration saved to: {}", path.display());
        Ok(())
    }

    pub fn into_regions(self) -> RegionSet {
        RegionSet::from_maps(&self.parking_slots, &self.illegal_zones)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_YAML: &str = r#"
tracking:
  slot_overlap_threshold: 0.40
  zone_overlap_threshold: 0.30
  fee_per_hour: 40.0
  event_bus_capacity: 256
regions:
  parking_slots:
    A1: [200, 550, 750, 900]
  illegal_zones:
    A3: [100, 100, 400, 300]
calibration:
  path: "/nonexistent/slot_calibration.json"
input:
  input_dir: "recordings"
  skip_empty_frames: false
output:
  event_log_csv: "outputs/parking_log.csv"
  events_jsonl: "outputs/events.jsonl"
  summary_json: "outputs/summary.json"
logging:
  level: "debug"
"#;

    #[test]
    fn test_config_parses_yaml() {
        let config: Config = serde_yaml::from_str(CONFIG_YAML).unwrap();
        assert_eq!(config.tracking.event_bus_capacity, 256);
        assert_eq!(
            config.regions.parking_slots["A1"],
            Rect::new(200.0, 550.0, 750.0, 900.0)
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_calibration_falls_back_to_config_regions() {
        let config: Config = serde_yaml::from_str(CONFIG_YAML).unwrap();
        let regions = config.resolve_regions();
        assert_eq!(regions.slots.len(), 1);
        assert_eq!(regions.slots[0].id, "A1");
        assert_eq!(regions.zones[0].id, "A3");
    }

    #[test]
    fn test_calibration_file_format() {
        let json = r#"{
            "parking_slots": {"A2": [750, 400, 1150, 650], "A1": [200, 550, 750, 900]},
            "illegal_zones": {"A3": [100, 100, 400, 300]},
            "reference_image": "reference_frame.jpg"
        }"#;
        let calibration: Calibration = serde_json::from_str(json).unwrap();
        assert_eq!(calibration.reference_image.as_deref(), Some("reference_frame.jpg"));
        assert_eq!(calibration.video_source, None);

        let regions = calibration.into_regions();
        let ids: Vec<&str> = regions.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"], "slots ordered by id");
        assert_eq!(regions.zones[0].bounds, Rect::new(100.0, 100.0, 400.0, 300.0));
    }

    #[test]
    fn test_calibration_save_then_load() {
        let path = std::env::temp_dir().join(format!(
            "parking_monitor_calibration_{}.json",
            std::process::id()
        ));
        let calibration = Calibration {
            parking_slots: [("B1".to_string(), Rect::new(0.0, 0.0, 10.0, 20.0))]
                .into_iter()
                .collect(),
            illegal_zones: BTreeMap::new(),
            reference_image: None,
            video_source: Some("cam_01.mp4".to_string()),
        };
        calibration.save(&path).unwrap();
        let loaded = Calibration::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, calibration);
    }

    #[test]
    fn test_malformed_calibration_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "parking_monitor_bad_calibration_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{not json").unwrap();
        let result = Calibration::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
