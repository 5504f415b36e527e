use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::decoder::StreamInfo;
use crate::instrumentation::{PlaybackReport, StutterEvent};
use crate::utils::logger;

/// Notifications for the presentation layer. Delivery is best effort: when
/// nobody drains the channel, new events are dropped rather than queued forever.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Opened(StreamInfo),
    FirstFrame { load_ms: f64 },
    Stutter(StutterEvent),
    SeekCompleted { target: f64, landed: f64 },
    SeekFailed { target: f64, message: String },
    Finished(PlaybackReport),
    Error(String),
}

#[derive(Clone)]
pub struct EventSender(Sender<PlayerEvent>);

impl EventSender {
    pub fn channel(capacity: usize) -> (Self, Receiver<PlayerEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self(tx), rx)
    }

    pub fn emit(&self, event: PlayerEvent) {
        if let Err(TrySendError::Full(event)) = self.0.try_send(event) {
            logger::debug(&format!("Event channel full, dropping {:?}", event));
        }
    }
}
