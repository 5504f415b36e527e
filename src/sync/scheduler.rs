//! Consumer side of the pipeline: paces frames from the queue against the
//! playback clock and decides, per frame, whether to wait, display or drop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::cancel::CancelToken;
use super::clock::PlaybackClock;
use super::pacing::{FrameDecision, FramePacer};
use crate::config::PacingConfig;
use crate::core::events::{EventSender, PlayerEvent};
use crate::core::frame_queue::FrameQueue;
use crate::core::presentation::{publish_frame, SharedSink, SharedState};
use crate::decoder::DecodedFrame;
use crate::error::{PlayerError, Result};
use crate::instrumentation::StutterDetector;
use crate::utils::logger;
use crate::utils::time_utils::Timer;

/// Everything one playback run needs from its session.
pub struct SchedulerContext {
    pub source: String,
    /// Stream duration in seconds; zero disables the near-end check.
    pub duration: f64,
    pub queue: Arc<FrameQueue>,
    pub state: SharedState,
    pub sink: SharedSink,
    pub events: EventSender,
    pub pacing: PacingConfig,
    /// Runs once after the final report, from the scheduler thread. The
    /// player uses it to request the rewind to 0.
    pub on_finished: Box<dyn FnOnce() + Send>,
    /// A frame an earlier run popped but never showed. It is shown first.
    pub resume_frame: Option<DecodedFrame>,
}

/// Handle to a running scheduler thread.
pub struct SchedulerHandle {
    cancel: CancelToken,
    queue: Arc<FrameQueue>,
    handle: Option<JoinHandle<Option<DecodedFrame>>>,
}

impl SchedulerHandle {
    pub fn spawn(ctx: SchedulerContext, clock: PlaybackClock) -> Result<Self> {
        let cancel = CancelToken::new();
        let queue = Arc::clone(&ctx.queue);
        let scheduler = Scheduler {
            pacer: FramePacer::new(&ctx.pacing),
            detector: StutterDetector::new(ctx.pacing.stutter_threshold()),
            finish_tolerance: ctx.pacing.finish_tolerance_secs,
            source: ctx.source,
            duration: ctx.duration,
            queue: ctx.queue,
            state: ctx.state,
            sink: ctx.sink,
            events: ctx.events,
            on_finished: Some(ctx.on_finished),
            held: ctx.resume_frame,
            cancel: cancel.clone(),
            clock,
        };

        let handle = thread::Builder::new()
            .name("frame-scheduler".into())
            .spawn(move || scheduler.run())
            .map_err(|e| PlayerError::Thread(e.to_string()))?;

        Ok(Self {
            cancel,
            queue,
            handle: Some(handle),
        })
    }

    /// Signals the loop to stop at its next check and wakes it if it is
    /// blocked waiting for a frame. Does not wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.queue.interrupt_consumers();
    }

    /// Cancels and waits for the thread to exit. A frame that was already
    /// past its final check may still be displayed before this returns.
    ///
    /// Returns the frame the loop had popped but not shown, if any, so the
    /// next run can start with it.
    pub fn stop(mut self) -> Option<DecodedFrame> {
        self.cancel();
        self.join_thread()
    }

    /// Waits for the loop to end on its own (end of stream).
    pub fn join(mut self) -> Option<DecodedFrame> {
        self.join_thread()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn join_thread(&mut self) -> Option<DecodedFrame> {
        match self.handle.take()?.join() {
            Ok(unshown) => unshown,
            Err(_) => {
                logger::error("Scheduler thread panicked");
                None
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            self.join_thread();
        }
    }
}

struct Scheduler {
    pacer: FramePacer,
    detector: StutterDetector,
    finish_tolerance: f64,
    source: String,
    duration: f64,
    queue: Arc<FrameQueue>,
    state: SharedState,
    sink: SharedSink,
    events: EventSender,
    on_finished: Option<Box<dyn FnOnce() + Send>>,
    held: Option<DecodedFrame>,
    cancel: CancelToken,
    clock: PlaybackClock,
}

impl Scheduler {
    fn run(mut self) -> Option<DecodedFrame> {
        logger::debug(&format!(
            "Scheduler started at {:.3}s",
            self.clock.start_pts()
        ));
        let mut frames_shown = 0u64;
        let mut unshown = None;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(frame) = self.next_frame() else {
                if !self.cancel.is_cancelled() && self.queue.has_reached_end() {
                    self.finish();
                }
                break;
            };

            match self.pacer.decide(frame.pts, self.clock.target_time()) {
                FrameDecision::Wait(delay) => {
                    if self.cancel.sleep(delay) {
                        unshown = Some(frame);
                        break;
                    }
                }
                FrameDecision::Drop { behind_secs } => {
                    self.state.write().stats.record_dropped();
                    logger::debug(&format!(
                        "Dropped frame {:.3}s ({:.1} ms late)",
                        frame.pts,
                        behind_secs * 1000.0
                    ));
                    continue;
                }
                FrameDecision::Display => {}
            }

            if self.cancel.is_cancelled() {
                unshown = Some(frame);
                break;
            }

            let pts = frame.pts;
            publish_frame(&self.state, &self.sink, frame);
            frames_shown += 1;

            if self.reached_finish(pts) {
                self.finish();
                break;
            }
        }

        logger::debug(&format!(
            "Scheduler exiting after {} frames ({:.2}s wall)",
            frames_shown,
            self.clock.elapsed().as_secs_f64()
        ));
        unshown
    }

    /// A held-back frame first, then a non-blocking pop; only when the queue
    /// has run dry is the wait measured, and a wait longer than one frame
    /// budget is a stutter.
    fn next_frame(&mut self) -> Option<DecodedFrame> {
        if let Some(frame) = self.held.take() {
            return Some(frame);
        }
        if let Some(frame) = self.queue.try_pop() {
            return Some(frame);
        }

        let video_time = self.state.read().current_time;
        let timer = Timer::new();
        let cancel = &self.cancel;
        let frame = self.queue.pop_blocking_unless(|| cancel.is_cancelled());
        let waited = timer.elapsed();

        if frame.is_some() {
            if let Some(event) = self.detector.check(video_time, waited) {
                logger::debug(&format!(
                    "Stutter at {:.3}s: waited {:.1} ms for decoder",
                    event.video_time, event.duration_ms
                ));
                self.state.write().stats.record_stutter(event.clone());
                self.events.emit(PlayerEvent::Stutter(event));
            }
        }
        frame
    }

    fn reached_finish(&self, pts: f64) -> bool {
        let near_end = self.duration > 0.0 && pts >= self.duration - self.finish_tolerance;
        near_end || self.queue.has_reached_end()
    }

    fn finish(&mut self) {
        let report = {
            let mut state = self.state.write();
            let report = state.stats.take_final_report(&self.source, self.duration);
            state.is_playing = false;
            state.current_time = 0.0;
            report
        };

        if let Some(report) = report {
            logger::info(&format!(
                "Playback finished: {} displayed, {} dropped, {} stutters ({:.1} ms)",
                report.frames_displayed,
                report.frames_dropped,
                report.stutter_count,
                report.total_stutter_ms
            ));
            self.events.emit(PlayerEvent::Finished(report));
        }

        if let Some(on_finished) = self.on_finished.take() {
            on_finished();
        }
    }
}
