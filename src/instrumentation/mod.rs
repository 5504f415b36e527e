//! Playback statistics derived purely from observed timing.
//!
//! Nothing here feeds back into pacing: the scheduler records what it saw
//! (consumer waits, displayed and dropped frames) and the player reports it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::time_utils::duration_ms;

/// The scheduler waited longer than one frame budget for the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StutterEvent {
    /// Stream position on screen when the wait began.
    pub video_time: f64,
    pub duration_ms: f64,
}

/// Final statistics for one playback, emitted once at end of stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub source: String,
    pub duration_secs: f64,
    pub frames_displayed: u64,
    pub frames_dropped: u64,
    pub first_frame_load_ms: Option<f64>,
    pub stutter_count: usize,
    pub total_stutter_ms: f64,
    pub stutter_events: Vec<StutterEvent>,
}

/// Classifies consumer waits against the per-frame budget.
#[derive(Debug, Clone, Copy)]
pub struct StutterDetector {
    threshold: Duration,
}

impl StutterDetector {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn check(&self, video_time: f64, waited: Duration) -> Option<StutterEvent> {
        (waited > self.threshold).then(|| StutterEvent {
            video_time,
            duration_ms: duration_ms(waited),
        })
    }
}

/// Per-session counters. Cleared when a new video is opened.
#[derive(Debug, Clone, Default)]
pub struct PlaybackStats {
    first_frame_load_ms: Option<f64>,
    stutter_events: Vec<StutterEvent>,
    total_stutter_ms: f64,
    frames_displayed: u64,
    frames_dropped: u64,
    report_emitted: bool,
}

impl PlaybackStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_first_frame(&mut self, load_ms: f64) {
        self.first_frame_load_ms = Some(load_ms);
    }

    pub fn record_stutter(&mut self, event: StutterEvent) {
        self.total_stutter_ms += event.duration_ms;
        self.stutter_events.push(event);
    }

    pub fn record_displayed(&mut self) {
        self.frames_displayed += 1;
    }

    pub fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn first_frame_load_ms(&self) -> Option<f64> {
        self.first_frame_load_ms
    }

    pub fn stutter_count(&self) -> usize {
        self.stutter_events.len()
    }

    pub fn total_stutter_ms(&self) -> f64 {
        self.total_stutter_ms
    }

    pub fn stutter_events(&self) -> &[StutterEvent] {
        &self.stutter_events
    }

    pub fn frames_displayed(&self) -> u64 {
        self.frames_displayed
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn report_emitted(&self) -> bool {
        self.report_emitted
    }

    /// Snapshot of the counters, whether or not playback has finished.
    pub fn report(&self, source: &str, duration_secs: f64) -> PlaybackReport {
        PlaybackReport {
            source: source.to_string(),
            duration_secs,
            frames_displayed: self.frames_displayed,
            frames_dropped: self.frames_dropped,
            first_frame_load_ms: self.first_frame_load_ms,
            stutter_count: self.stutter_events.len(),
            total_stutter_ms: self.total_stutter_ms,
            stutter_events: self.stutter_events.clone(),
        }
    }

    /// The end-of-stream report. Returns `None` on every call after the first
    /// so overlapping finish conditions cannot emit twice.
    pub fn take_final_report(&mut self, source: &str, duration_secs: f64) -> Option<PlaybackReport> {
        if self.report_emitted {
            return None;
        }
        self.report_emitted = true;
        Some(self.report(source, duration_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_threshold_is_exclusive() {
        let detector = StutterDetector::new(Duration::from_micros(16_700));
        assert!(detector.check(1.0, Duration::from_micros(16_700)).is_none());
        let event = detector.check(1.0, Duration::from_millis(50)).unwrap();
        assert_eq!(event.video_time, 1.0);
        assert!((event.duration_ms - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_stutter_totals_accumulate() {
        let mut stats = PlaybackStats::default();
        stats.record_stutter(StutterEvent { video_time: 0.5, duration_ms: 20.0 });
        stats.record_stutter(StutterEvent { video_time: 2.0, duration_ms: 30.5 });
        assert_eq!(stats.stutter_count(), 2);
        assert!((stats.total_stutter_ms() - 50.5).abs() < 1e-9);
        assert_eq!(stats.stutter_events()[1].video_time, 2.0);
    }

    #[test]
    fn test_final_report_is_emitted_once() {
        let mut stats = PlaybackStats::default();
        stats.record_first_frame(12.5);
        stats.record_displayed();
        stats.record_dropped();

        let report = stats.take_final_report("synthetic:", 10.0).unwrap();
        assert_eq!(report.frames_displayed, 1);
        assert_eq!(report.frames_dropped, 1);
        assert_eq!(report.first_frame_load_ms, Some(12.5));
        assert!(stats.take_final_report("synthetic:", 10.0).is_none());

        stats.reset();
        assert!(!stats.report_emitted());
        assert_eq!(stats.frames_displayed(), 0);
        assert!(stats.take_final_report("synthetic:", 10.0).is_some());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let stats = PlaybackStats::default();
        let json = serde_json::to_value(stats.report("clip.mp4", 3.0)).unwrap();
        assert_eq!(json["source"], "clip.mp4");
        assert_eq!(json["stutter_count"], 0);
        assert!(json["first_frame_load_ms"].is_null());
    }
}
