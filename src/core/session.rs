use std::sync::Arc;

use super::frame_queue::FrameQueue;
use crate::decoder::{CodecEngine, DecodeWorker, EngineFactory, StreamInfo};
use crate::error::{PlayerError, Result};
use crate::utils::logger;

/// Where the engine currently lives: inside the decode thread, or parked
/// with the session while the producer is stopped.
enum EngineSlot {
    Running(DecodeWorker),
    Parked(Box<dyn CodecEngine>),
    /// The decode thread panicked and took the engine with it.
    Empty,
}

/// One opened source: its engine, its queue and the stream geometry.
pub(crate) struct Session {
    source: String,
    info: StreamInfo,
    queue: Arc<FrameQueue>,
    engine: EngineSlot,
}

impl Session {
    /// Creates an engine for `source`, opens it and starts decoding.
    pub fn open(factory: &dyn EngineFactory, source: &str, capacity: usize) -> Result<Self> {
        let mut engine = factory.create(source);
        let info = match engine.open(source) {
            Ok(info) => info,
            Err(e) => {
                engine.close();
                return Err(PlayerError::Open {
                    source_name: source.to_string(),
                    reason: format!("{:#}", e),
                });
            }
        };

        logger::info(&format!(
            "Video opened: {}x{} @ {:.2} fps, {:.2}s ({})",
            info.width, info.height, info.fps, info.duration_secs, source
        ));

        let mut session = Self {
            source: source.to_string(),
            info,
            queue: Arc::new(FrameQueue::new(capacity)),
            engine: EngineSlot::Parked(engine),
        };
        session.start_producer()?;
        Ok(session)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    /// Starts a fresh decode thread from the engine's current position.
    /// No-op while one is already running.
    pub fn start_producer(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.engine, EngineSlot::Empty) {
            EngineSlot::Parked(engine) => {
                let worker = DecodeWorker::spawn(engine, Arc::clone(&self.queue))?;
                self.engine = EngineSlot::Running(worker);
                Ok(())
            }
            EngineSlot::Running(worker) => {
                self.engine = EngineSlot::Running(worker);
                Ok(())
            }
            EngineSlot::Empty => Err(PlayerError::WorkerPanicked),
        }
    }

    /// Stops the decode thread and parks the engine. Afterwards nothing but
    /// the caller touches the engine.
    pub fn stop_producer(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.engine, EngineSlot::Empty) {
            EngineSlot::Running(worker) => {
                let engine = worker.stop()?;
                self.engine = EngineSlot::Parked(engine);
                Ok(())
            }
            EngineSlot::Parked(engine) => {
                self.engine = EngineSlot::Parked(engine);
                Ok(())
            }
            EngineSlot::Empty => Err(PlayerError::WorkerPanicked),
        }
    }

    /// The parked engine. Fails while the producer is running.
    pub fn engine_mut(&mut self) -> Result<&mut dyn CodecEngine> {
        match &mut self.engine {
            EngineSlot::Parked(engine) => Ok(engine.as_mut()),
            EngineSlot::Running(_) => Err(PlayerError::Thread(
                "engine is owned by the decode thread".into(),
            )),
            EngineSlot::Empty => Err(PlayerError::WorkerPanicked),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.engine, EngineSlot::Empty) {
            // Dropping the worker joins the thread and closes the engine.
            EngineSlot::Running(worker) => drop(worker),
            EngineSlot::Parked(mut engine) => engine.close(),
            EngineSlot::Empty => {}
        }
        logger::debug(&format!("Session closed: {}", self.source));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{EngineProbe, SyntheticEngine, SyntheticSpec};

    fn factory(probe: &Arc<EngineProbe>) -> impl Fn(&str) -> Box<dyn CodecEngine> + Send {
        let probe = Arc::clone(probe);
        move |_: &str| -> Box<dyn CodecEngine> {
            Box::new(SyntheticEngine::new(SyntheticSpec::default()).with_probe(Arc::clone(&probe)))
        }
    }

    #[test]
    fn test_open_starts_producer() {
        let probe = Arc::new(EngineProbe::default());
        let session = Session::open(&factory(&probe), "synthetic:duration=2", 8).unwrap();

        assert_eq!(session.info().duration_secs, 2.0);
        assert_eq!(session.source(), "synthetic:duration=2");
        assert!(session.queue().is_decoding_enabled());
        let first = session.queue().pop_blocking().unwrap();
        assert_eq!(first.pts, 0.0);
        assert_eq!(probe.opens(), 1);
    }

    #[test]
    fn test_failed_open_still_calls_close() {
        let probe = Arc::new(EngineProbe::default());
        let make = {
            let probe = Arc::clone(&probe);
            move |_: &str| -> Box<dyn CodecEngine> {
                Box::new(
                    SyntheticEngine::new(SyntheticSpec::default())
                        .with_probe(Arc::clone(&probe))
                        .failing_open(),
                )
            }
        };

        match Session::open(&make, "synthetic:", 8) {
            Err(PlayerError::Open { source_name, .. }) => assert_eq!(source_name, "synthetic:"),
            other => panic!("expected open failure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(probe.close_calls(), 1);
        assert_eq!(probe.closes(), 0, "engine never opened, nothing to release");
    }

    #[test]
    fn test_engine_only_reachable_while_parked() {
        let probe = Arc::new(EngineProbe::default());
        let mut session = Session::open(&factory(&probe), "synthetic:", 4).unwrap();

        assert!(session.engine_mut().is_err());
        session.stop_producer().unwrap();
        session.engine_mut().unwrap().seek(3.0).unwrap();
        assert_eq!(probe.seeks(), 1);

        session.queue().clear();
        session.start_producer().unwrap();
        assert_eq!(session.queue().pop_blocking().unwrap().pts, 3.0);
    }

    #[test]
    fn test_drop_closes_engine_once() {
        let probe = Arc::new(EngineProbe::default());
        let mut session = Session::open(&factory(&probe), "synthetic:", 4).unwrap();
        session.stop_producer().unwrap();
        drop(session);
        assert_eq!(probe.closes(), 1);

        let session = Session::open(&factory(&probe), "synthetic:", 4).unwrap();
        drop(session);
        assert_eq!(probe.closes(), 2);
    }
}
