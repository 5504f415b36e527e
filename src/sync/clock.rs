use std::time::{Duration, Instant};

/// Wall-clock baseline for one playback run.
///
/// Re-established on every play, resume and post-seek restart: the frame that
/// should be on screen at `now` has pts `start_pts + (now - start_wall)`.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    start_wall: Instant,
    start_pts: f64,
}

impl PlaybackClock {
    /// Starts the clock now at stream position `start_pts`.
    pub fn new(start_pts: f64) -> Self {
        Self::starting_at(Instant::now(), start_pts)
    }

    pub fn starting_at(start_wall: Instant, start_pts: f64) -> Self {
        Self {
            start_wall,
            start_pts,
        }
    }

    /// Stream time that should be presented right now.
    pub fn target_time(&self) -> f64 {
        self.target_time_at(Instant::now())
    }

    pub fn target_time_at(&self, now: Instant) -> f64 {
        self.start_pts + now.saturating_duration_since(self.start_wall).as_secs_f64()
    }

    /// Wall time elapsed since the baseline was set.
    pub fn elapsed(&self) -> Duration {
        self.start_wall.elapsed()
    }

    pub fn start_pts(&self) -> f64 {
        self.start_pts
    }
}
