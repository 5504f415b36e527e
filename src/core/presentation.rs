//! State published to the presentation layer.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::decoder::{DecodedFrame, StreamInfo};
use crate::instrumentation::{PlaybackStats, StutterEvent};

/// Receives every frame the player puts on screen.
///
/// Called from the scheduler thread during playback and from the control
/// thread for the first frame after open and the landing frame after a seek.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &DecodedFrame);
}

/// Discards frames; state is still published.
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &DecodedFrame) {}
}

impl<F> FrameSink for F
where
    F: FnMut(&DecodedFrame) + Send,
{
    fn present(&mut self, frame: &DecodedFrame) {
        self(frame)
    }
}

pub type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

pub fn shared_sink(sink: impl FrameSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

/// Observable player state.
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    pub current_frame: Option<DecodedFrame>,
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub stream_info: Option<StreamInfo>,
    pub stats: PlaybackStats,
}

impl PlayerState {
    pub fn first_frame_load_ms(&self) -> Option<f64> {
        self.stats.first_frame_load_ms()
    }

    pub fn stutter_count(&self) -> usize {
        self.stats.stutter_count()
    }

    pub fn total_stutter_ms(&self) -> f64 {
        self.stats.total_stutter_ms()
    }

    pub fn stutter_events(&self) -> &[StutterEvent] {
        self.stats.stutter_events()
    }

    /// Forgets everything about the previous video.
    pub(crate) fn reset_for_open(&mut self) {
        *self = Self {
            is_loading: true,
            ..Self::default()
        };
    }
}

pub type SharedState = Arc<RwLock<PlayerState>>;

/// Hands `frame` to the sink and makes it the current frame.
pub(crate) fn publish_frame(state: &SharedState, sink: &SharedSink, frame: DecodedFrame) {
    sink.lock().present(&frame);
    let mut state = state.write();
    state.current_time = frame.pts;
    state.current_frame = Some(frame);
    state.stats.record_displayed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FrameImage, PixelFormat};

    #[test]
    fn test_publish_frame_updates_state_and_sink() {
        let state: SharedState = Arc::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            shared_sink(move |f: &DecodedFrame| seen.lock().push(f.pts))
        };

        let frame = DecodedFrame::new(FrameImage::new(1, 1, PixelFormat::Gray8, vec![9]), 2.5);
        publish_frame(&state, &sink, frame);

        let snapshot = state.read().clone();
        assert_eq!(snapshot.current_time, 2.5);
        assert_eq!(snapshot.current_frame.unwrap().image.data(), &[9]);
        assert_eq!(snapshot.stats.frames_displayed(), 1);
        assert_eq!(*seen.lock(), vec![2.5]);
    }

    #[test]
    fn test_reset_for_open_clears_previous_video() {
        let mut state = PlayerState {
            current_time: 4.0,
            duration: 10.0,
            error_message: Some("old".into()),
            ..PlayerState::default()
        };
        state.stats.record_dropped();
        state.reset_for_open();
        assert!(state.is_loading);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 0.0);
        assert!(state.error_message.is_none());
        assert_eq!(state.stats.frames_dropped(), 0);
    }
}
