pub const APP_NAME: &str = "frame-pacer";

pub const CONFIG_FILE: &str = "frame-pacer.json";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

/// Frames buffered between the decode thread and the scheduler.
pub const DEFAULT_QUEUE_CAPACITY: usize = 30;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One frame at 60 fps.
pub const DEFAULT_STUTTER_THRESHOLD_MS: f64 = 16.7;
pub const DEFAULT_LATE_DROP_MS: f64 = 100.0;
pub const DEFAULT_MAX_SLEEP_MS: f64 = 1000.0;
pub const DEFAULT_FINISH_TOLERANCE_SECS: f64 = 0.5;

pub const SYNTHETIC_SCHEME: &str = "synthetic:";

pub const SEEK_STEP_SECS: f64 = 5.0;
pub const STATUS_REFRESH_MS: u64 = 100;
