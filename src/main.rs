// src/main.rs
//
// Replays recorded detection logs through the parking engine and writes the
// parking log, the event log and a session summary.

use anyhow::Result;
use parking_monitor::pipeline::{FrameInput, ParkingEngine};
use parking_monitor::replay::{DetectionReplay, PlateCache};
use parking_monitor::report::SessionSummary;
use parking_monitor::sink::{CsvEventLog, EventSink, JsonlEventLog};
use parking_monitor::timestamp::FrameClock;
use parking_monitor::tracking::StatusCounts;
use parking_monitor::types::Config;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("PARKING_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parking_monitor={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🅿️  Parking Monitor Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Thresholds: slot overlap > {:.2}, zone overlap > {:.2}, fee {:.2}/hour",
        config.tracking.slot_overlap_threshold,
        config.tracking.zone_overlap_threshold,
        config.tracking.fee_per_hour
    );

    let regions = config.resolve_regions();
    if regions.is_empty() {
        warn!("⚠️  No parking slots or illegal zones configured");
    }
    let mut engine = ParkingEngine::new(regions, &config.tracking)?;

    let mut status_rx = engine.subscribe();
    let status_watcher = tokio::spawn(async move {
        let mut last_counts = StatusCounts::default();
        while status_rx.changed().await.is_ok() {
            let snapshot = status_rx.borrow_and_update().clone();
            if snapshot.counts != last_counts {
                debug!(
                    "📋 Frame {}: {} available, {} occupied, {} illegal zones, {} illegally occupied",
                    snapshot.frame_number,
                    snapshot.counts.available,
                    snapshot.counts.occupied,
                    snapshot.counts.illegal_zone,
                    snapshot.counts.illegal_occupied
                );
                last_counts = snapshot.counts;
            }
        }
    });

    let replay = DetectionReplay::new(&config.input);
    let logs = replay.find_logs()?;
    if logs.is_empty() {
        error!("No detection logs found in {}", config.input.input_dir);
        return Ok(());
    }

    let mut csv_log = CsvEventLog::create(&config.output.event_log_csv)?;
    let mut jsonl_log = JsonlEventLog::create(&config.output.events_jsonl)?;
    let mut clock = FrameClock::new();
    let mut plates = PlateCache::new();

    for (idx, log_path) in logs.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Replaying log {}/{}: {}",
            idx + 1,
            logs.len(),
            log_path.display()
        );
        info!("========================================\n");

        let mut sinks: [&mut dyn EventSink; 2] = [&mut csv_log, &mut jsonl_log];
        match replay_log(
            log_path,
            &replay,
            &mut engine,
            &mut sinks,
            &mut clock,
            &mut plates,
            config.input.skip_empty_frames,
        ) {
            Ok(stats) => {
                info!("\n✓ Log replayed successfully!");
                info!("  Frames: {}", stats.frames);
                info!("  Skipped (empty): {}", stats.skipped);
                info!("  Malformed lines: {}", stats.malformed);
                info!("  Events written: {}", stats.events_written);
            }
            Err(e) => {
                error!("Failed to replay log: {:#}", e);
            }
        }
    }

    info!("💾 Parking log rows: {}", csv_log.rows());
    info!("💾 Event log lines: {}", jsonl_log.lines());

    let handle = engine.handle();
    let stats = handle.get_statistics();
    if stats.slots.orphan_exits > 0 || stats.slots.silent_handoffs > 0 {
        warn!(
            "⚠️  {} orphan exit(s), {} silent hand-off(s), {} untimed exit(s)",
            stats.slots.orphan_exits, stats.slots.silent_handoffs, stats.slots.untimed_exits
        );
    }

    let summary = SessionSummary::build(
        config.input.input_dir.clone(),
        clock.span(),
        &stats,
        engine.unique_vehicles(),
        engine.metrics().summary(),
    );
    summary.log();
    summary.save(&config.output.summary_json)?;

    // Dropping the engine closes the status channel and ends the watcher.
    drop(engine);
    if let Err(e) = status_watcher.await {
        warn!("Status watcher ended abnormally: {}", e);
    }

    Ok(())
}

struct ReplayStats {
    frames: u64,
    skipped: u64,
    malformed: u64,
    events_written: usize,
}

fn replay_log(
    log_path: &Path,
    replay: &DetectionReplay,
    engine: &mut ParkingEngine,
    sinks: &mut [&mut dyn EventSink],
    clock: &mut FrameClock,
    plates: &mut PlateCache,
    skip_empty_frames: bool,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats {
        frames: 0,
        skipped: 0,
        malformed: 0,
        events_written: 0,
    };

    for frame in replay.open(log_path)? {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("⚠️  Skipping line: {:#}", e);
                stats.malformed += 1;
                continue;
            }
        };
        stats.frames += 1;

        let timestamp = clock.resolve(frame.timestamp.as_deref());
        plates.absorb(&frame.plates);

        if skip_empty_frames && frame.detections.is_empty() {
            engine.skip_frame(frame.frame_number);
            stats.skipped += 1;
            continue;
        }

        let input = FrameInput::new(frame.frame_number, timestamp, frame.detections);
        let output = engine.process_frame(&input, plates.enrichment());
        if !output.is_quiet() {
            debug!(
                "Frame {}: {} parking event(s), {} violation(s)",
                output.frame_number,
                output.events.len(),
                output.violations.len()
            );
        }
        stats.events_written += engine.forward(sinks)?;

        if stats.frames % 500 == 0 {
            info!(
                "Progress: {} frames ({:.1} FPS)",
                stats.frames,
                engine.metrics().fps()
            );
        }
    }

    Ok(stats)
}
