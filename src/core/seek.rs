//! Seek protocol: stop the scheduler and the producer, clear the queue,
//! reposition the engine, restart the producer, read the landing frame and
//! resume if playback was active.

use super::events::PlayerEvent;
use super::player::Controller;
use super::presentation::publish_frame;
use crate::error::{PlayerError, Result};
use crate::utils::logger;

impl Controller {
    pub(super) fn seek(&mut self, target: f64) -> Result<()> {
        if self.session.is_none() {
            return Ok(());
        }
        let target = if target.is_finite() { target.max(0.0) } else { 0.0 };
        let was_playing = self.state.read().is_playing;

        // Stopping the scheduler first means the producer's disable cannot
        // race a display.
        self.stop_scheduler();
        // The queue is about to be cleared; a held-back frame goes with it.
        self.held_frame = None;

        let outcome = self.reposition(target);
        match &outcome {
            Ok(landed) => {
                logger::debug(&format!("Seek to {:.3}s landed at {:.3}s", target, landed));
                self.events.emit(PlayerEvent::SeekCompleted {
                    target,
                    landed: *landed,
                });
            }
            Err(PlayerError::Seek { reason, .. }) => {
                logger::warn(&format!("Seek to {:.3}s failed: {}", target, reason));
                self.events.emit(PlayerEvent::SeekFailed {
                    target,
                    message: reason.clone(),
                });
            }
            Err(e) => {
                logger::error(&format!("Seek to {:.3}s broke the session: {}", target, e));
                self.session = None;
                {
                    let mut state = self.state.write();
                    state.is_playing = false;
                    state.error_message = Some(e.to_string());
                }
                self.events.emit(PlayerEvent::Error(e.to_string()));
                return Err(e.clone());
            }
        }

        if was_playing {
            self.start_scheduler()?;
        }
        outcome.map(|_| ())
    }

    /// Runs with the scheduler stopped. Returns the pts now on screen.
    fn reposition(&mut self, target: f64) -> Result<f64> {
        let session = self.session.as_mut().ok_or(PlayerError::NoSession)?;

        session.stop_producer()?;
        let discarded = session.queue().clear();

        let engine = session.engine_mut()?;
        let seeked = engine.seek(target).map_err(|e| PlayerError::Seek {
            target,
            reason: format!("{:#}", e),
        });
        if seeked.is_ok() {
            engine.flush();
        }

        // Restart even after a rejected seek so playback can carry on from
        // wherever the engine stopped.
        session.start_producer()?;
        seeked?;

        logger::debug(&format!("Seek flushed {} queued frames", discarded));

        let landed = match session.queue().pop_blocking() {
            Some(frame) => {
                let pts = frame.pts;
                publish_frame(&self.state, &self.sink, frame);
                pts
            }
            // Past the last frame: park at the requested position.
            None => {
                self.state.write().current_time = target;
                target
            }
        };
        Ok(landed)
    }
}
