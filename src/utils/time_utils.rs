use std::time::{Duration, Instant};

/// Wall-clock stopwatch used for latency measurements.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Fractional milliseconds, for reporting.
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.start.elapsed())
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Converts a millisecond setting into a `Duration`. Negatives and NaN clamp
/// to zero, values past one day clamp to one day.
pub fn ms_to_duration(ms: f64) -> Duration {
    const DAY_MS: f64 = 86_400_000.0;
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms.min(DAY_MS) / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Formats stream seconds as `m:ss.mmm`.
pub fn format_timestamp(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let total_ms = (secs * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{}:{:02}.{:03}", minutes, seconds, millis)
}
