use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PlayerError;
use crate::shared::constants;
use crate::utils::time_utils::ms_to_duration;

/// Thresholds for the pacing loop. The defaults were tuned by eye on real
/// playback and are settings, not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// A consumer wait longer than this is recorded as a stutter.
    pub stutter_threshold_ms: f64,
    /// Frames trailing the clock by more than this are dropped.
    pub late_drop_ms: f64,
    /// Upper bound on a single pre-display sleep.
    pub max_sleep_ms: f64,
    /// Playback finishes once the displayed pts is this close to the duration.
    pub finish_tolerance_secs: f64,
}

impl PacingConfig {
    pub fn stutter_threshold(&self) -> Duration {
        ms_to_duration(self.stutter_threshold_ms)
    }

    pub fn late_drop_secs(&self) -> f64 {
        self.late_drop_ms / 1000.0
    }

    pub fn max_sleep(&self) -> Duration {
        ms_to_duration(self.max_sleep_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            stutter_threshold_ms: constants::DEFAULT_STUTTER_THRESHOLD_MS,
            late_drop_ms: constants::DEFAULT_LATE_DROP_MS,
            max_sleep_ms: constants::DEFAULT_MAX_SLEEP_MS,
            finish_tolerance_secs: constants::DEFAULT_FINISH_TOLERANCE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub queue_capacity: usize,
    /// Start playing as soon as the first frame of a new video is shown.
    pub autoplay: bool,
    pub event_capacity: usize,
    /// Frames wider than this are downscaled by the engine before queueing.
    pub max_frame_width: Option<u32>,
    pub pacing: PacingConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            autoplay: true,
            event_capacity: constants::DEFAULT_EVENT_CAPACITY,
            max_frame_width: None,
            pacing: PacingConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, else the default config file if one exists in
    /// the working directory, else the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(constants::CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.queue_capacity == 0 {
            return Err(PlayerError::Config("queue_capacity must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(PlayerError::Config("event_capacity must be at least 1".into()));
        }
        if self.max_frame_width == Some(0) {
            return Err(PlayerError::Config("max_frame_width must be at least 1".into()));
        }
        let p = &self.pacing;
        let fields = [
            ("stutter_threshold_ms", p.stutter_threshold_ms),
            ("late_drop_ms", p.late_drop_ms),
            ("max_sleep_ms", p.max_sleep_ms),
            ("finish_tolerance_secs", p.finish_tolerance_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(PlayerError::Config(format!(
                    "pacing.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{ "queue_capacity": 8, "pacing": { "late_drop_ms": 150 } }"#)
                .unwrap();
        assert_eq!(config.queue_capacity, 8);
        assert!(config.autoplay);
        assert_eq!(config.pacing.late_drop_ms, 150.0);
        assert_eq!(config.pacing.max_sleep_ms, 1000.0);
        assert!((config.pacing.late_drop_secs() - 0.15).abs() < 1e-9);
        assert_eq!(config.max_frame_width, None);

        let capped: PlayerConfig = serde_json::from_str(r#"{ "max_frame_width": 320 }"#).unwrap();
        assert_eq!(capped.max_frame_width, Some(320));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PlayerConfig::default();
        assert!(config.validate().is_ok());

        config.queue_capacity = 0;
        assert!(matches!(config.validate(), Err(PlayerError::Config(_))));

        config.queue_capacity = 4;
        config.pacing.stutter_threshold_ms = -1.0;
        assert!(matches!(config.validate(), Err(PlayerError::Config(_))));

        config.pacing.stutter_threshold_ms = 16.7;
        config.max_frame_width = Some(0);
        assert!(matches!(config.validate(), Err(PlayerError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("frame_pacer_config_test.json");
        std::fs::write(&path, r#"{ "autoplay": false }"#).unwrap();
        let config = PlayerConfig::load(&path).unwrap();
        assert!(!config.autoplay);
        assert_eq!(config.queue_capacity, constants::DEFAULT_QUEUE_CAPACITY);
        let _ = std::fs::remove_file(&path);
    }
}
