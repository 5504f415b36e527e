use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::CodecEngine;
use crate::core::frame_queue::FrameQueue;
use crate::error::{PlayerError, Result};
use crate::utils::logger;

/// Marks end of file if the decode thread unwinds, so a consumer blocked on
/// the queue is released instead of waiting forever.
struct EndOfFileOnPanic<'a>(&'a FrameQueue);

impl Drop for EndOfFileOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.mark_end_of_file();
        }
    }
}

/// Dedicated decode thread feeding a [`FrameQueue`].
///
/// The engine moves into the thread and comes back out of [`DecodeWorker::stop`],
/// so nothing else can touch it while decoding runs. Once the thread ends
/// (end of file or stop) it never restarts; spawn a new worker instead.
pub struct DecodeWorker {
    queue: Arc<FrameQueue>,
    handle: Option<JoinHandle<Box<dyn CodecEngine>>>,
}

impl DecodeWorker {
    pub fn spawn(engine: Box<dyn CodecEngine>, queue: Arc<FrameQueue>) -> Result<Self> {
        queue.set_decoding_enabled(true);

        let thread_queue = Arc::clone(&queue);
        let spawned = thread::Builder::new()
            .name("frame-decoder".into())
            .spawn(move || decode_loop(engine, &thread_queue));

        match spawned {
            Ok(handle) => Ok(Self {
                queue,
                handle: Some(handle),
            }),
            Err(e) => {
                queue.set_decoding_enabled(false);
                logger::error(&format!("Failed to start decode thread: {}", e));
                Err(PlayerError::Thread(e.to_string()))
            }
        }
    }

    /// True once the thread has run to end of file or been stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Disables decoding, joins the thread and hands the engine back.
    ///
    /// When this returns the thread no longer touches the engine or the queue.
    pub fn stop(mut self) -> Result<Box<dyn CodecEngine>> {
        self.queue.set_decoding_enabled(false);
        let handle = self.handle.take().ok_or(PlayerError::WorkerPanicked)?;
        handle.join().map_err(|err| {
            match err.downcast_ref::<String>() {
                Some(e) => logger::error(&format!("Decode thread panicked: {}", e)),
                None => logger::error("Decode thread panicked with unknown reason"),
            }
            PlayerError::WorkerPanicked
        })
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.queue.set_decoding_enabled(false);
            match handle.join() {
                Ok(mut engine) => engine.close(),
                Err(_) => logger::error("Decode thread panicked during teardown"),
            }
        }
    }
}

fn decode_loop(mut engine: Box<dyn CodecEngine>, queue: &FrameQueue) -> Box<dyn CodecEngine> {
    let _guard = EndOfFileOnPanic(queue);
    logger::debug("Decoder thread started");
    let mut frames_decoded = 0u64;

    while queue.wait_for_space() {
        match engine.decode_next_frame() {
            Some(frame) => {
                if !queue.push(frame) {
                    break; // stopped while the frame was in flight
                }
                frames_decoded += 1;
            }
            None => {
                queue.mark_end_of_file();
                logger::debug("Decoder EOF");
                break;
            }
        }
    }

    logger::debug(&format!(
        "Decoder thread exiting. Frames decoded: {}",
        frames_decoded
    ));
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{SyntheticEngine, SyntheticSpec};
    use std::time::Duration;

    fn opened_engine(source: &str) -> Box<dyn CodecEngine> {
        let mut engine = SyntheticEngine::new(SyntheticSpec::default());
        engine.open(source).unwrap();
        Box::new(engine)
    }

    #[test]
    fn test_worker_fills_queue_to_capacity_and_parks() {
        let queue = Arc::new(FrameQueue::new(4));
        let worker = DecodeWorker::spawn(opened_engine("synthetic:"), Arc::clone(&queue)).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(queue.len(), 4);
        assert!(!worker.is_finished());

        let engine = worker.stop().unwrap();
        assert!(!queue.is_decoding_enabled());
        drop(engine);
    }

    #[test]
    fn test_worker_marks_end_of_file_and_exits() {
        let queue = Arc::new(FrameQueue::new(8));
        let worker =
            DecodeWorker::spawn(opened_engine("synthetic:duration=0.1,fps=30"), Arc::clone(&queue))
                .unwrap();

        let mut pts = Vec::new();
        while let Some(frame) = queue.pop_blocking() {
            pts.push(frame.pts);
        }
        assert_eq!(pts.len(), 3);
        assert!(queue.has_reached_end());

        let mut engine = worker.stop().unwrap();
        assert!(engine.decode_next_frame().is_none());
    }

    #[test]
    fn test_stopped_engine_is_free_to_seek() {
        let queue = Arc::new(FrameQueue::new(2));
        let worker = DecodeWorker::spawn(opened_engine("synthetic:"), Arc::clone(&queue)).unwrap();
        thread::sleep(Duration::from_millis(50));

        let mut engine = worker.stop().unwrap();
        engine.seek(3.0).unwrap();
        let frame = engine.decode_next_frame().unwrap();
        assert!((frame.pts - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_closes_engine() {
        let engine = SyntheticEngine::new(SyntheticSpec::default());
        let probe = engine.probe();
        let mut engine: Box<dyn CodecEngine> = Box::new(engine);
        engine.open("synthetic:").unwrap();

        let queue = Arc::new(FrameQueue::new(2));
        let worker = DecodeWorker::spawn(engine, Arc::clone(&queue)).unwrap();
        drop(worker);
        assert_eq!(probe.closes(), 1);
    }
}
