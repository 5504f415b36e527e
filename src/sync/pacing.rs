use std::time::Duration;

use crate::config::PacingConfig;

/// What to do with a frame given where the clock says playback should be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDecision {
    /// Early: sleep this long, then display.
    Wait(Duration),
    /// Due now, or slightly late: display immediately.
    Display,
    /// Too stale to be worth showing.
    Drop { behind_secs: f64 },
}

/// Wait/display/drop policy for the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    late_drop_secs: f64,
    max_sleep: Duration,
}

impl FramePacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            late_drop_secs: config.late_drop_secs(),
            max_sleep: config.max_sleep(),
        }
    }

    pub fn decide(&self, pts: f64, target: f64) -> FrameDecision {
        if pts > target {
            // Capped so a bogus timestamp cannot stall the loop.
            let early = Duration::try_from_secs_f64(pts - target).unwrap_or(self.max_sleep);
            FrameDecision::Wait(early.min(self.max_sleep))
        } else if target - pts > self.late_drop_secs {
            FrameDecision::Drop {
                behind_secs: target - pts,
            }
        } else {
            FrameDecision::Display
        }
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(&PacingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_early_frame_waits() {
        let pacer = FramePacer::default();
        match pacer.decide(1.040, 1.0) {
            FrameDecision::Wait(d) => assert!((d.as_secs_f64() - 0.040).abs() < 1e-6),
            other => panic!("expected wait, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_is_capped() {
        let pacer = FramePacer::default();
        assert_eq!(pacer.decide(30.0, 1.0), FrameDecision::Wait(Duration::from_secs(1)));
    }

    #[test]
    fn test_slightly_late_frame_displays() {
        let pacer = FramePacer::default();
        assert_eq!(pacer.decide(1.0, 1.0), FrameDecision::Display);
        assert_eq!(pacer.decide(0.95, 1.0), FrameDecision::Display);
    }

    #[test]
    fn test_stale_frame_drops() {
        let pacer = FramePacer::default();
        match pacer.decide(0.85, 1.0) {
            FrameDecision::Drop { behind_secs } => assert!((behind_secs - 0.15).abs() < 1e-9),
            other => panic!("expected drop, got {:?}", other),
        }
    }

    #[test]
    fn test_thresholds_follow_config() {
        let config = PacingConfig {
            late_drop_ms: 200.0,
            max_sleep_ms: 100.0,
            ..PacingConfig::default()
        };
        let pacer = FramePacer::new(&config);
        assert_eq!(pacer.decide(0.85, 1.0), FrameDecision::Display);
        assert_eq!(pacer.decide(2.0, 1.0), FrameDecision::Wait(Duration::from_millis(100)));
    }
}
