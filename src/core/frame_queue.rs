//! Bounded FIFO between the decode thread and the playback scheduler.
//!
//! One mutex guards the frames and every flag, so a clear is atomic with
//! respect to push and pop. Waits have no timeout: disabling, clearing and
//! end-of-file always broadcast so nobody is left parked.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use crate::decoder::DecodedFrame;
use crate::shared::constants;

struct QueueState {
    frames: VecDeque<DecodedFrame>,
    decoding_enabled: bool,
    end_of_file: bool,
    /// Bumped by `clear`; a consumer that slept across a clear gets no frame.
    generation: u64,
    /// Bumped by `interrupt_consumers`.
    interrupts: u64,
}

pub struct FrameQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    frame_available: Condvar,
    space_available: Condvar,
}

impl FrameQueue {
    /// Creates a queue holding at most `capacity` frames (minimum 1).
    /// Decoding starts disabled; the decode worker enables it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                decoding_enabled: false,
                end_of_file: false,
                generation: 0,
                interrupts: 0,
            }),
            capacity,
            frame_available: Condvar::new(),
            space_available: Condvar::new(),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(constants::DEFAULT_QUEUE_CAPACITY)
    }

    /// Appends a frame, blocking while the queue is full and decoding is enabled.
    ///
    /// Returns false, discarding the frame, when decoding is disabled.
    pub fn push(&self, frame: DecodedFrame) -> bool {
        let mut state = self.state.lock();
        while state.frames.len() >= self.capacity && state.decoding_enabled {
            self.space_available.wait(&mut state);
        }
        if !state.decoding_enabled {
            return false;
        }

        state.frames.push_back(frame);
        self.frame_available.notify_one();
        true
    }

    /// Parks the producer until there is room for another frame.
    ///
    /// Returns false when decoding was disabled while waiting.
    pub fn wait_for_space(&self) -> bool {
        let mut state = self.state.lock();
        while state.frames.len() >= self.capacity && state.decoding_enabled {
            self.space_available.wait(&mut state);
        }
        state.decoding_enabled
    }

    /// Takes the oldest frame without waiting.
    pub fn try_pop(&self) -> Option<DecodedFrame> {
        let mut state = self.state.lock();
        let frame = state.frames.pop_front();
        if frame.is_some() {
            self.space_available.notify_one();
        }
        frame
    }

    /// Takes the oldest frame, waiting while the queue is empty and the stream
    /// is still live.
    ///
    /// Returns `None` at end of file, when decoding is disabled, or when the
    /// queue is cleared or interrupted during the wait.
    pub fn pop_blocking(&self) -> Option<DecodedFrame> {
        self.pop_blocking_unless(|| false)
    }

    /// [`FrameQueue::pop_blocking`] that also gives up once `stop` returns true.
    ///
    /// `stop` is evaluated under the queue lock before every wait, so a stop
    /// raised before [`FrameQueue::interrupt_consumers`] is seen even when the
    /// interrupt lands before this call starts waiting.
    pub fn pop_blocking_unless(&self, stop: impl Fn() -> bool) -> Option<DecodedFrame> {
        let mut state = self.state.lock();
        let generation = state.generation;
        let interrupts = state.interrupts;

        loop {
            if state.generation != generation || state.interrupts != interrupts || stop() {
                return None;
            }
            if let Some(frame) = state.frames.pop_front() {
                self.space_available.notify_one();
                return Some(frame);
            }
            if state.end_of_file || !state.decoding_enabled {
                return None;
            }
            self.frame_available.wait(&mut state);
        }
    }

    pub fn set_decoding_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.decoding_enabled = enabled;
        if !enabled {
            self.frame_available.notify_all();
            self.space_available.notify_all();
        }
    }

    /// Records that the producer could not obtain another frame.
    ///
    /// Only the first call per stream position has an effect; returns whether
    /// this call set the flag.
    pub fn mark_end_of_file(&self) -> bool {
        let mut state = self.state.lock();
        if state.end_of_file {
            return false;
        }
        state.end_of_file = true;
        self.frame_available.notify_all();
        true
    }

    /// Drops every queued frame and resets end-of-file. Returns the number of
    /// frames discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.frames.len();
        state.frames.clear();
        state.end_of_file = false;
        state.generation = state.generation.wrapping_add(1);
        self.frame_available.notify_all();
        self.space_available.notify_all();
        dropped
    }

    /// Wakes a consumer blocked in `pop_blocking` without touching the frames.
    /// Only waits already in progress are released; pair it with a stop flag
    /// checked by [`FrameQueue::pop_blocking_unless`] to cover waits that
    /// have not started yet.
    pub fn interrupt_consumers(&self) {
        let mut state = self.state.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        self.frame_available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_decoding_enabled(&self) -> bool {
        self.state.lock().decoding_enabled
    }

    pub fn is_end_of_file(&self) -> bool {
        self.state.lock().end_of_file
    }

    /// End of file with nothing left to show.
    pub fn has_reached_end(&self) -> bool {
        let state = self.state.lock();
        state.end_of_file && state.frames.is_empty()
    }

    /// Current fill level (0.0 to 1.0)
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity as f32
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FrameImage, PixelFormat};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn frame(pts: f64) -> DecodedFrame {
        DecodedFrame::new(FrameImage::new(1, 1, PixelFormat::Gray8, vec![0]), pts)
    }

    fn live_queue(capacity: usize) -> Arc<FrameQueue> {
        let queue = Arc::new(FrameQueue::new(capacity));
        queue.set_decoding_enabled(true);
        queue
    }

    #[test]
    fn test_fifo_order_and_try_pop() {
        let queue = live_queue(4);
        assert!(queue.try_pop().is_none());
        for i in 0..3 {
            assert!(queue.push(frame(i as f64)));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().unwrap().pts, 0.0);
        assert_eq!(queue.pop_blocking().unwrap().pts, 1.0);
        assert_eq!(queue.try_pop().unwrap().pts, 2.0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_length_stays_within_capacity() {
        let queue = live_queue(5);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..500 {
                    if !queue.push(frame(i as f64)) {
                        break;
                    }
                    assert!(queue.len() <= queue.capacity());
                }
                queue.mark_end_of_file();
            })
        };

        // Irregular consumer: alternate bursts of non-blocking and blocking pops.
        let mut seed: u32 = 12345;
        let mut last = -1.0;
        let mut received = 0;
        loop {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let next = if seed % 3 == 0 {
                queue.try_pop()
            } else {
                let f = queue.pop_blocking();
                if f.is_none() && queue.has_reached_end() {
                    break;
                }
                f
            };
            let len = queue.len();
            assert!(len <= queue.capacity());
            if let Some(f) = next {
                assert!(f.pts > last);
                last = f.pts;
                received += 1;
            }
        }
        producer.join().unwrap();
        assert_eq!(received, 500);
    }

    #[test]
    fn test_push_blocks_until_pop_makes_room() {
        let queue = live_queue(1);
        assert!(queue.push(frame(0.0)));

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(frame(1.0)))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.try_pop().unwrap().pts, 0.0);
        assert!(pusher.join().unwrap());
        assert_eq!(queue.try_pop().unwrap().pts, 1.0);
    }

    #[test]
    fn test_disable_wakes_blocked_pusher_and_popper() {
        let queue = live_queue(1);
        assert!(queue.push(frame(0.0)));

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(frame(1.0)))
        };
        let empty = live_queue(1);
        let popper = {
            let empty = Arc::clone(&empty);
            thread::spawn(move || empty.pop_blocking())
        };
        thread::sleep(Duration::from_millis(50));

        queue.set_decoding_enabled(false);
        empty.set_decoding_enabled(false);
        assert!(!pusher.join().unwrap());
        assert!(popper.join().unwrap().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_clear_unblocks_waiting_pop_with_no_frame() {
        let queue = live_queue(3);
        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };
        thread::sleep(Duration::from_millis(50));

        queue.clear();
        // A frame from the next state must not be handed to the stale waiter.
        queue.push(frame(5.0));
        assert!(popper.join().unwrap().is_none());
        assert_eq!(queue.try_pop().unwrap().pts, 5.0);
    }

    #[test]
    fn test_clear_resets_end_of_file_and_drops_frames() {
        let queue = live_queue(3);
        queue.push(frame(0.0));
        queue.push(frame(1.0));
        assert!(queue.mark_end_of_file());
        assert!(!queue.mark_end_of_file());
        assert!(!queue.has_reached_end());

        assert_eq!(queue.clear(), 2);
        assert!(!queue.is_end_of_file());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_end_of_file_wakes_consumer() {
        let queue = live_queue(2);
        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };
        thread::sleep(Duration::from_millis(50));
        queue.mark_end_of_file();
        assert!(popper.join().unwrap().is_none());
        assert!(queue.has_reached_end());
    }

    #[test]
    fn test_interrupt_wakes_consumer_but_keeps_frames() {
        let queue = live_queue(2);
        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };
        thread::sleep(Duration::from_millis(50));
        queue.interrupt_consumers();
        assert!(popper.join().unwrap().is_none());

        queue.push(frame(0.0));
        queue.interrupt_consumers();
        assert_eq!(queue.pop_blocking().unwrap().pts, 0.0);
    }

    #[test]
    fn test_stop_raised_before_wait_releases_consumer() {
        let queue = live_queue(2);
        let stopped = Arc::new(AtomicBool::new(false));

        // Stop and interrupt both land before the consumer starts waiting.
        stopped.store(true, Ordering::SeqCst);
        queue.interrupt_consumers();

        let popper = {
            let queue = Arc::clone(&queue);
            let stopped = Arc::clone(&stopped);
            thread::spawn(move || queue.pop_blocking_unless(|| stopped.load(Ordering::SeqCst)))
        };
        thread::sleep(Duration::from_millis(100));
        assert!(popper.is_finished(), "consumer still waiting after stop");
        assert!(popper.join().unwrap().is_none());
    }

    #[test]
    fn test_stop_raised_during_wait_releases_consumer() {
        let queue = live_queue(2);
        let stopped = Arc::new(AtomicBool::new(false));
        let popper = {
            let queue = Arc::clone(&queue);
            let stopped = Arc::clone(&stopped);
            thread::spawn(move || queue.pop_blocking_unless(|| stopped.load(Ordering::SeqCst)))
        };
        thread::sleep(Duration::from_millis(50));
        stopped.store(true, Ordering::SeqCst);
        queue.interrupt_consumers();
        assert!(popper.join().unwrap().is_none());

        queue.push(frame(1.0));
        assert_eq!(queue.pop_blocking_unless(|| false).unwrap().pts, 1.0);
    }

    #[test]
    fn test_fill_level() {
        let queue = live_queue(4);
        queue.push(frame(0.0));
        assert!((queue.fill_level() - 0.25).abs() < f32::EPSILON);
    }
}
