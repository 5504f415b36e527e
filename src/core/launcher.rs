//! Headless entry points behind the `probe` and `bench` commands.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::events::PlayerEvent;
use super::player::Player;
use crate::config::PlayerConfig;
use crate::decoder::{engine_with_max_width, StreamInfo};
use crate::instrumentation::PlaybackReport;
use crate::utils::logger;

/// Opens `source` just long enough to read its stream info, as the player
/// would see it under `config`.
pub fn probe(config: &PlayerConfig, source: &str) -> Result<StreamInfo> {
    let mut engine = engine_with_max_width(source, config.max_frame_width);
    let info = engine.open(source);
    engine.close();
    info.with_context(|| format!("failed to probe {}", source))
}

/// Plays `source` to the end (or until Ctrl-C) without a display and returns
/// the playback report.
pub fn run_bench(config: PlayerConfig, source: &str) -> Result<PlaybackReport> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let player = Player::new(config)?;
    player
        .open_video(source)
        .with_context(|| format!("failed to open {}", source))?;
    player.play()?;
    logger::info(&format!("Benchmark started: {}", source));

    let mut finished = None;
    while running.load(Ordering::SeqCst) {
        match player.events().recv_timeout(Duration::from_millis(100)) {
            Ok(PlayerEvent::Finished(report)) => {
                finished = Some(report);
                break;
            }
            Ok(PlayerEvent::Stutter(event)) => {
                eprintln!(
                    "stutter at {:.3}s: {:.1} ms",
                    event.video_time, event.duration_ms
                );
            }
            Ok(_) => {}
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    let report = match finished {
        Some(report) => report,
        None => {
            // Interrupted: report what was seen so far.
            player.pause()?;
            let state = player.state();
            logger::info("Benchmark interrupted");
            state.stats.report(source, state.duration)
        }
    };
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reads_stream_info() {
        let info = probe(
            &PlayerConfig::default(),
            "synthetic:duration=4,fps=24,width=320,height=180",
        )
        .unwrap();
        assert_eq!(
            info,
            StreamInfo {
                width: 320,
                height: 180,
                duration_secs: 4.0,
                fps: 24.0,
            }
        );
    }

    #[test]
    fn test_probe_applies_width_cap() {
        let config = PlayerConfig {
            max_frame_width: Some(160),
            ..PlayerConfig::default()
        };
        let info = probe(&config, "synthetic:width=320,height=180").unwrap();
        assert_eq!((info.width, info.height), (160, 90));
    }

    #[test]
    fn test_probe_reports_bad_source() {
        let err = probe(&PlayerConfig::default(), "synthetic:fps=-1").unwrap_err();
        assert!(format!("{:#}", err).contains("failed to probe"));
    }
}
