use anyhow::{anyhow, bail, Result};
#[cfg(target_os = "macos")]
use opencv::core;
use opencv::{imgproc, prelude::*, videoio};

use super::{fit_width, CodecEngine, DecodedFrame, FrameImage, PixelFormat, StreamInfo};
use crate::utils::logger;
use crate::utils::time_utils::Timer;

/// File and stream decoding through OpenCV's `VideoCapture`.
///
/// Frames come out as RGB24. With a width cap set, wider frames are
/// downscaled (aspect preserved) before they are queued.
pub struct OpenCvEngine {
    capture: Option<videoio::VideoCapture>,
    fps: f64,
    frame_index: u64,
    max_width: Option<u32>,
}

impl OpenCvEngine {
    pub fn new() -> Self {
        Self {
            capture: None,
            fps: 0.0,
            frame_index: 0,
            max_width: None,
        }
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width.max(1));
        self
    }

    fn capture(&mut self) -> Result<&mut videoio::VideoCapture> {
        self.capture.as_mut().ok_or_else(|| anyhow!("engine is not open"))
    }

    fn read_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let timer = Timer::new();
        let mut frame = Mat::default();
        let capture = self.capture()?;
        if !capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        let pos_ms = capture.get(videoio::CAP_PROP_POS_MSEC)?;

        let mut rgb = Mat::default();
        #[cfg(target_os = "macos")]
        imgproc::cvt_color(&frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0, core::AlgorithmHint::ALGO_HINT_DEFAULT)?;

        #[cfg(not(target_os = "macos"))]
        imgproc::cvt_color(&frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        if !rgb.is_continuous() {
            bail!("frame is not continuous");
        }

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let mut image = FrameImage::new(width, height, PixelFormat::Rgb24, rgb.data_bytes()?.to_vec());
        if let Some(max) = self.max_width {
            image = image.downscale_to_width(max)?;
        }

        // Some backends report 0 until the stream clock starts.
        let pts = if pos_ms > 0.0 || self.frame_index == 0 {
            pos_ms / 1000.0
        } else {
            self.frame_index as f64 / self.fps
        };
        self.frame_index += 1;

        if timer.elapsed_ms() > 10.0 {
            logger::debug(&format!(
                "Slow decode: {:.1} ms for frame at {:.3}s",
                timer.elapsed_ms(),
                pts
            ));
        }
        Ok(Some(DecodedFrame::new(image, pts)))
    }
}

impl Default for OpenCvEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecEngine for OpenCvEngine {
    fn open(&mut self, source: &str) -> Result<StreamInfo> {
        self.close();

        // CAP_ANY lets OpenCV choose the backend (AVFoundation, Media Foundation, FFmpeg).
        let capture = videoio::VideoCapture::from_file(source, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            bail!("OpenCV could not open {}", source);
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32;
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;
        if !(fps.is_finite() && fps > 0.0) {
            bail!("{} reports no frame rate", source);
        }
        let duration_secs = if frame_count > 0.0 { frame_count / fps } else { 0.0 };

        logger::debug(&format!(
            "OpenCV opened {}: {}x{} @ {:.2} fps, {} frames",
            source, width, height, fps, frame_count
        ));

        self.capture = Some(capture);
        self.fps = fps;
        self.frame_index = 0;

        let (width, height) = match self.max_width {
            Some(max) => fit_width(width, height, max),
            None => (width, height),
        };
        Ok(StreamInfo {
            width,
            height,
            duration_secs,
            fps,
        })
    }

    fn decode_next_frame(&mut self) -> Option<DecodedFrame> {
        match self.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                logger::error(&format!("Decoding error: {:#}", e));
                None
            }
        }
    }

    fn seek(&mut self, secs: f64) -> Result<()> {
        let capture = self.capture()?;
        if !capture.set(videoio::CAP_PROP_POS_MSEC, secs * 1000.0)? {
            bail!("backend refused to seek to {:.3}s", secs);
        }
        let frame_pos = capture.get(videoio::CAP_PROP_POS_FRAMES)?;
        self.frame_index = frame_pos.max(0.0) as u64;
        Ok(())
    }

    // VideoCapture keeps no frames across a seek.
    fn flush(&mut self) {}

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                logger::warn(&format!("Failed to release capture: {}", e));
            }
        }
    }
}

impl Drop for OpenCvEngine {
    fn drop(&mut self) {
        self.close();
    }
}
