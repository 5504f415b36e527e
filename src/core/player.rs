//! Public player facade.
//!
//! Every control operation runs on one control thread that owns the session
//! and the scheduler, so open, play, pause and seek never race each other.
//! The public methods send a command and wait for its reply.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::events::{EventSender, PlayerEvent};
use super::presentation::{publish_frame, shared_sink, FrameSink, NullSink, PlayerState, SharedSink, SharedState};
use super::session::Session;
use crate::config::PlayerConfig;
use crate::decoder::{engine_with_max_width, DecodedFrame, EngineFactory};
use crate::error::{PlayerError, Result};
use crate::sync::{PlaybackClock, SchedulerContext, SchedulerHandle};
use crate::utils::logger;
use crate::utils::time_utils::Timer;

type Reply = Sender<Result<()>>;

pub(crate) enum Command {
    Open { source: String, reply: Reply },
    Play { reply: Reply },
    Pause { reply: Reply },
    /// `reply` is `None` for fire-and-forget seeks such as the rewind after
    /// playback finishes.
    Seek { target: f64, reply: Option<Reply> },
    Shutdown,
}

pub struct Player {
    commands: Sender<Command>,
    state: SharedState,
    events: Receiver<PlayerEvent>,
    control: Option<JoinHandle<()>>,
}

impl Player {
    /// Player with the default engine selection and no frame sink.
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::with_sink(config, NullSink)
    }

    /// Default engine selection, honouring `max_frame_width`.
    pub fn with_sink(config: PlayerConfig, sink: impl FrameSink + 'static) -> Result<Self> {
        let max_frame_width = config.max_frame_width;
        let factory = move |source: &str| engine_with_max_width(source, max_frame_width);
        Self::with_engine_factory(config, factory, sink)
    }

    pub fn with_engine_factory(
        config: PlayerConfig,
        factory: impl EngineFactory + 'static,
        sink: impl FrameSink + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let state: SharedState = Arc::default();
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let (events, event_rx) = EventSender::channel(config.event_capacity);

        let controller = Controller {
            factory: Box::new(factory),
            sink: shared_sink(sink),
            state: Arc::clone(&state),
            events,
            commands: commands.clone(),
            session: None,
            scheduler: None,
            held_frame: None,
            config,
        };

        let control = thread::Builder::new()
            .name("player-control".into())
            .spawn(move || controller.run(command_rx))
            .map_err(|e| PlayerError::Thread(e.to_string()))?;

        Ok(Self {
            commands,
            state,
            events: event_rx,
            control: Some(control),
        })
    }

    /// Opens `source`, replacing any open video. Returns once the first frame
    /// is on screen (or the open failed).
    pub fn open_video(&self, source: &str) -> Result<()> {
        let source = source.to_string();
        self.request(|reply| Command::Open { source, reply })
    }

    pub fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply })
    }

    pub fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply })
    }

    /// Seeks and waits for the landing frame. When several seeks are queued
    /// only the last one runs; the others get its result.
    pub fn seek(&self, secs: f64) -> Result<()> {
        self.request(|reply| Command::Seek {
            target: secs,
            reply: Some(reply),
        })
    }

    /// Queues a seek without waiting for it.
    pub fn seek_async(&self, secs: f64) -> Result<()> {
        self.commands
            .send(Command::Seek {
                target: secs,
                reply: None,
            })
            .map_err(|_| PlayerError::Disconnected)
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> PlayerState {
        self.state.read().clone()
    }

    pub fn current_time(&self) -> f64 {
        self.state.read().current_time
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().is_playing
    }

    pub fn events(&self) -> &Receiver<PlayerEvent> {
        &self.events
    }

    fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply, response) = crossbeam_channel::bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| PlayerError::Disconnected)?;
        response.recv().map_err(|_| PlayerError::Disconnected)?
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(control) = self.control.take() {
            if control.join().is_err() {
                logger::error("Player control thread panicked");
            }
        }
    }
}

/// State owned by the control thread.
pub(crate) struct Controller {
    pub(super) config: PlayerConfig,
    pub(super) factory: Box<dyn EngineFactory>,
    pub(super) sink: SharedSink,
    pub(super) state: SharedState,
    pub(super) events: EventSender,
    /// Lets the scheduler queue the rewind after playback finishes.
    pub(super) commands: Sender<Command>,
    pub(super) session: Option<Session>,
    pub(super) scheduler: Option<SchedulerHandle>,
    /// Popped by a cancelled scheduler run before it could be shown. Belongs
    /// to the current queue contents, so anything that clears the queue
    /// drops it too.
    pub(super) held_frame: Option<DecodedFrame>,
}

impl Controller {
    fn run(mut self, commands: Receiver<Command>) {
        logger::debug("Control thread started");
        let mut deferred: Option<Command> = None;

        loop {
            let command = match deferred.take() {
                Some(command) => command,
                None => match commands.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            match command {
                Command::Open { source, reply } => {
                    let _ = reply.send(self.open(&source));
                }
                Command::Play { reply } => {
                    let _ = reply.send(self.play());
                }
                Command::Pause { reply } => {
                    let _ = reply.send(self.pause());
                }
                Command::Seek { target, reply } => {
                    let (target, replies) = coalesce_seeks(target, reply, &commands, &mut deferred);
                    let result = self.seek(target);
                    for reply in replies {
                        let _ = reply.send(result.clone());
                    }
                }
                Command::Shutdown => break,
            }
        }

        self.teardown();
        logger::debug("Control thread exiting");
    }

    fn open(&mut self, source: &str) -> Result<()> {
        self.stop_scheduler();
        self.held_frame = None;
        self.state.write().reset_for_open();
        // Old engine and queue go away before the new engine is created.
        self.session = None;

        let timer = Timer::new();
        let session = match Session::open(self.factory.as_ref(), source, self.config.queue_capacity) {
            Ok(session) => session,
            Err(e) => {
                logger::error(&format!("Open failed: {}", e));
                {
                    let mut state = self.state.write();
                    state.is_loading = false;
                    state.error_message = Some(e.to_string());
                }
                self.events.emit(PlayerEvent::Error(e.to_string()));
                return Err(e);
            }
        };

        let info = session.info().clone();
        self.events.emit(PlayerEvent::Opened(info.clone()));

        match session.queue().pop_blocking() {
            Some(frame) => {
                publish_frame(&self.state, &self.sink, frame);
                let load_ms = timer.elapsed_ms();
                self.state.write().stats.record_first_frame(load_ms);
                self.events.emit(PlayerEvent::FirstFrame { load_ms });
                logger::info(&format!("First frame ready in {:.1} ms", load_ms));
            }
            None => logger::warn(&format!("{} produced no frames", source)),
        }

        {
            let mut state = self.state.write();
            state.duration = info.duration_secs;
            state.stream_info = Some(info);
            state.is_loading = false;
        }
        self.session = Some(session);

        if self.config.autoplay {
            self.play()?;
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(PlayerError::NoSession);
        }
        if self.state.read().is_playing {
            return Ok(());
        }
        self.start_scheduler()
    }

    fn pause(&mut self) -> Result<()> {
        self.state.write().is_playing = false;
        self.stop_scheduler();
        Ok(())
    }

    /// Starts a scheduler run from the current position with a fresh clock.
    pub(super) fn start_scheduler(&mut self) -> Result<()> {
        self.stop_scheduler();
        let session = self.session.as_ref().ok_or(PlayerError::NoSession)?;

        let start_pts = {
            let mut state = self.state.write();
            state.is_playing = true;
            state.current_time
        };

        let commands = self.commands.clone();
        let ctx = SchedulerContext {
            source: session.source().to_string(),
            duration: session.info().duration_secs,
            queue: Arc::clone(session.queue()),
            state: Arc::clone(&self.state),
            sink: Arc::clone(&self.sink),
            events: self.events.clone(),
            pacing: self.config.pacing.clone(),
            on_finished: Box::new(move || {
                let _ = commands.send(Command::Seek {
                    target: 0.0,
                    reply: None,
                });
            }),
            resume_frame: self.held_frame.take(),
        };

        match SchedulerHandle::spawn(ctx, PlaybackClock::new(start_pts)) {
            Ok(handle) => {
                self.scheduler = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.write().is_playing = false;
                Err(e)
            }
        }
    }

    pub(super) fn stop_scheduler(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            if let Some(frame) = scheduler.stop() {
                self.held_frame = Some(frame);
            }
        }
    }

    fn teardown(&mut self) {
        self.stop_scheduler();
        self.held_frame = None;
        self.session = None;
        self.state.write().is_playing = false;
    }
}

/// Folds every seek already waiting behind `target` into one request. The
/// first non-seek command found ends the run and is handed back in `deferred`.
fn coalesce_seeks(
    mut target: f64,
    reply: Option<Reply>,
    commands: &Receiver<Command>,
    deferred: &mut Option<Command>,
) -> (f64, Vec<Reply>) {
    let mut replies: Vec<Reply> = reply.into_iter().collect();
    let mut superseded = 0;

    while let Ok(next) = commands.try_recv() {
        match next {
            Command::Seek {
                target: next_target,
                reply,
            } => {
                target = next_target;
                replies.extend(reply);
                superseded += 1;
            }
            other => {
                *deferred = Some(other);
                break;
            }
        }
    }

    if superseded > 0 {
        logger::debug(&format!(
            "Coalesced {} pending seeks into {:.3}s",
            superseded, target
        ));
    }
    (target, replies)
}
