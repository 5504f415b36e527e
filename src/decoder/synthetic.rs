//! Deterministic test-pattern engine.
//!
//! Produces flat-shaded frames at `index / fps` with keyframes every
//! `keyframe_interval_secs`, so seeks land on a predictable position. Decode
//! delays, seek failures and open failures can be injected to exercise the
//! pacing and error paths without a real codec.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{fit_width, CodecEngine, DecodedFrame, FrameImage, PixelFormat, StreamInfo};
use crate::utils::logger;
use crate::shared::constants;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
    pub keyframe_interval_secs: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            width: 64,
            height: 36,
            fps: 30.0,
            duration_secs: 10.0,
            keyframe_interval_secs: 1.0,
        }
    }
}

impl SyntheticSpec {
    /// Applies `key=value` overrides from a `synthetic:` source string.
    pub fn apply_source(&mut self, source: &str) -> Result<()> {
        let params = source
            .strip_prefix(constants::SYNTHETIC_SCHEME)
            .ok_or_else(|| anyhow!("not a synthetic source: {}", source))?;

        for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected key=value, got '{}'", pair))?;
            let parse = |v: &str| -> Result<f64> {
                v.parse::<f64>()
                    .with_context(|| format!("invalid number for {}: '{}'", key, v))
            };
            match key {
                "duration" => self.duration_secs = parse(value)?,
                "fps" => self.fps = parse(value)?,
                "width" => self.width = parse(value)? as u32,
                "height" => self.height = parse(value)? as u32,
                "keyframe" => self.keyframe_interval_secs = parse(value)?,
                other => bail!("unknown synthetic parameter '{}'", other),
            }
        }

        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("fps must be positive, got {}", self.fps);
        }
        if !(self.duration_secs.is_finite() && self.duration_secs >= 0.0) {
            bail!("duration must be non-negative, got {}", self.duration_secs);
        }
        if self.width == 0 || self.height == 0 {
            bail!("geometry must be non-zero, got {}x{}", self.width, self.height);
        }
        Ok(())
    }

    fn total_frames(&self) -> u64 {
        (self.duration_secs * self.fps).round() as u64
    }

    fn frames_per_keyframe(&self) -> u64 {
        ((self.keyframe_interval_secs * self.fps).round() as u64).max(1)
    }
}

/// Counts engine calls so tests can check every session was released.
#[derive(Debug, Default)]
pub struct EngineProbe {
    opens: AtomicUsize,
    closes: AtomicUsize,
    close_calls: AtomicUsize,
    seeks: AtomicUsize,
    flushes: AtomicUsize,
}

impl EngineProbe {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Every `close` call, including ones on an engine that never opened.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

pub struct SyntheticEngine {
    spec: SyntheticSpec,
    next_index: u64,
    opened: bool,
    decode_delays: HashMap<u64, Duration>,
    fail_open: bool,
    fail_seeks: bool,
    max_width: Option<u32>,
    probe: Arc<EngineProbe>,
}

impl SyntheticEngine {
    pub fn new(spec: SyntheticSpec) -> Self {
        Self {
            spec,
            next_index: 0,
            opened: false,
            decode_delays: HashMap::new(),
            fail_open: false,
            fail_seeks: false,
            max_width: None,
            probe: Arc::new(EngineProbe::default()),
        }
    }

    /// Stalls the decode of frame `index` (counted from the start of the stream).
    pub fn with_decode_delay(mut self, index: u64, delay: Duration) -> Self {
        self.decode_delays.insert(index, delay);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_seeks(mut self) -> Self {
        self.fail_seeks = true;
        self
    }

    /// Renders at full size, then downscales wider frames like a real engine.
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width.max(1));
        self
    }

    pub fn with_probe(mut self, probe: Arc<EngineProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn probe(&self) -> Arc<EngineProbe> {
        Arc::clone(&self.probe)
    }

    fn render(&self, index: u64) -> Result<FrameImage> {
        let shade = (index % 256) as u8;
        let len = self.spec.width as usize * self.spec.height as usize * 3;
        let image = FrameImage::new(self.spec.width, self.spec.height, PixelFormat::Rgb24, vec![shade; len]);
        match self.max_width {
            Some(max) => image.downscale_to_width(max),
            None => Ok(image),
        }
    }
}

impl CodecEngine for SyntheticEngine {
    fn open(&mut self, source: &str) -> Result<StreamInfo> {
        if self.fail_open {
            bail!("synthetic open failure for '{}'", source);
        }
        if source.starts_with(constants::SYNTHETIC_SCHEME) {
            self.spec.apply_source(source)?;
        }
        self.next_index = 0;
        self.opened = true;
        self.probe.opens.fetch_add(1, Ordering::SeqCst);

        let (width, height) = match self.max_width {
            Some(max) => fit_width(self.spec.width, self.spec.height, max),
            None => (self.spec.width, self.spec.height),
        };
        Ok(StreamInfo {
            width,
            height,
            duration_secs: self.spec.duration_secs,
            fps: self.spec.fps,
        })
    }

    fn decode_next_frame(&mut self) -> Option<DecodedFrame> {
        if !self.opened || self.next_index >= self.spec.total_frames() {
            return None;
        }
        let index = self.next_index;
        if let Some(delay) = self.decode_delays.get(&index) {
            std::thread::sleep(*delay);
        }
        self.next_index += 1;
        match self.render(index) {
            Ok(image) => Some(DecodedFrame::new(image, index as f64 / self.spec.fps)),
            Err(e) => {
                logger::error(&format!("Synthetic frame {} failed: {:#}", index, e));
                None
            }
        }
    }

    fn seek(&mut self, secs: f64) -> Result<()> {
        if !self.opened {
            bail!("engine is not open");
        }
        if self.fail_seeks {
            bail!("synthetic seek failure at {:.3}s", secs);
        }
        self.probe.seeks.fetch_add(1, Ordering::SeqCst);

        let total = self.spec.total_frames();
        let wanted = ((secs.max(0.0) * self.spec.fps) + 1e-9).floor() as u64;
        self.next_index = if wanted >= total {
            total
        } else {
            let gop = self.spec.frames_per_keyframe();
            (wanted / gop) * gop
        };
        Ok(())
    }

    fn flush(&mut self) {
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.opened {
            self.opened = false;
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
