//! Codec engine seam.
//!
//! Bitstream parsing and pixel conversion live behind [`CodecEngine`]. The
//! player only ever drives one engine from one thread at a time; the decode
//! worker owns it while running and hands it back when stopped.

pub mod frame_data;
pub mod producer;
pub mod synthetic;
#[cfg(feature = "opencv")]
pub mod video;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use frame_data::{fit_width, DecodedFrame, FrameImage, PixelFormat};
pub use producer::DecodeWorker;
pub use synthetic::{EngineProbe, SyntheticEngine, SyntheticSpec};
#[cfg(feature = "opencv")]
pub use video::OpenCvEngine;

use crate::shared::constants;

/// Geometry and timing reported when a source is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Zero when the container does not report one.
    pub duration_secs: f64,
    pub fps: f64,
}

pub trait CodecEngine: Send {
    fn open(&mut self, source: &str) -> Result<StreamInfo>;

    /// Decodes the next frame. `None` covers both end of stream and an
    /// unrecoverable decode error; callers cannot tell them apart.
    fn decode_next_frame(&mut self) -> Option<DecodedFrame>;

    /// Repositions to the nearest decodable point at or before `secs`.
    fn seek(&mut self, secs: f64) -> Result<()>;

    /// Drops any frames buffered inside the decoder.
    fn flush(&mut self);

    /// Releases every resource. Must be safe to call more than once.
    fn close(&mut self);
}

/// Creates a fresh engine for each opened session.
pub trait EngineFactory: Send {
    fn create(&self, source: &str) -> Box<dyn CodecEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str) -> Box<dyn CodecEngine> + Send,
{
    fn create(&self, source: &str) -> Box<dyn CodecEngine> {
        self(source)
    }
}

/// Picks the engine for a source: `synthetic:` sources get the built-in test
/// pattern, anything else goes to OpenCV when it is compiled in.
pub fn default_engine(source: &str) -> Box<dyn CodecEngine> {
    engine_with_max_width(source, None)
}

/// [`default_engine`] with frames wider than `max_frame_width` downscaled.
pub fn engine_with_max_width(source: &str, max_frame_width: Option<u32>) -> Box<dyn CodecEngine> {
    if source.starts_with(constants::SYNTHETIC_SCHEME) {
        let engine = SyntheticEngine::new(SyntheticSpec::default());
        return match max_frame_width {
            Some(max) => Box::new(engine.with_max_width(max)),
            None => Box::new(engine),
        };
    }
    platform_engine(max_frame_width)
}

#[cfg(feature = "opencv")]
fn platform_engine(max_frame_width: Option<u32>) -> Box<dyn CodecEngine> {
    let engine = OpenCvEngine::new();
    match max_frame_width {
        Some(max) => Box::new(engine.with_max_width(max)),
        None => Box::new(engine),
    }
}

#[cfg(not(feature = "opencv"))]
fn platform_engine(_max_frame_width: Option<u32>) -> Box<dyn CodecEngine> {
    Box::new(UnavailableEngine)
}

/// Stand-in when no real decoder is compiled in; every open fails cleanly.
#[cfg(not(feature = "opencv"))]
struct UnavailableEngine;

#[cfg(not(feature = "opencv"))]
impl CodecEngine for UnavailableEngine {
    fn open(&mut self, source: &str) -> Result<StreamInfo> {
        anyhow::bail!(
            "no decoder for '{}': rebuild with `--features opencv` or use a `{}` source",
            source,
            constants::SYNTHETIC_SCHEME
        )
    }

    fn decode_next_frame(&mut self) -> Option<DecodedFrame> {
        None
    }

    fn seek(&mut self, _secs: f64) -> Result<()> {
        anyhow::bail!("no decoder available")
    }

    fn flush(&mut self) {}

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_routes_synthetic_sources() {
        let mut engine = default_engine("synthetic:duration=1,fps=10");
        let info = engine.open("synthetic:duration=1,fps=10").unwrap();
        assert_eq!(info.fps, 10.0);
        assert!(engine.decode_next_frame().is_some());
        engine.close();
    }

    #[test]
    fn test_width_cap_reaches_synthetic_engine() {
        let mut engine = engine_with_max_width("synthetic:", Some(16));
        let info = engine.open("synthetic:width=64,height=32").unwrap();
        assert_eq!((info.width, info.height), (16, 8));
        assert_eq!(engine.decode_next_frame().unwrap().image.width, 16);
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_file_source_without_decoder_fails_to_open() {
        let mut engine = default_engine("/tmp/movie.mp4");
        assert!(engine.open("/tmp/movie.mp4").is_err());
        engine.close();
        engine.close();
    }
}
