//! Paced video playback: a decode thread feeds a bounded frame queue, and a
//! scheduler presents each frame against a wall-clock baseline, waiting,
//! displaying or dropping as the clock dictates.

pub mod config;
pub mod core;
pub mod decoder;
pub mod error;
pub mod instrumentation;
pub mod shared;
pub mod sync;
pub mod ui;
pub mod utils;

pub use crate::config::{PacingConfig, PlayerConfig};
pub use crate::core::{FrameSink, NullSink, Player, PlayerEvent, PlayerState};
pub use crate::decoder::{CodecEngine, DecodedFrame, EngineFactory, StreamInfo};
pub use crate::error::{PlayerError, Result};
pub use crate::instrumentation::{PlaybackReport, StutterEvent};
