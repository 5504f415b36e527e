use anyhow::Result;
use fast_image_resize as fr;
use fr::images::Image;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    fn resize_type(self) -> fr::PixelType {
        match self {
            PixelFormat::Rgb24 => fr::PixelType::U8x3,
            PixelFormat::Rgba32 => fr::PixelType::U8x4,
            PixelFormat::Gray8 => fr::PixelType::U8,
        }
    }
}

/// `width`x`height` scaled to at most `max_width` columns with the aspect
/// ratio kept. Sizes already within the cap come back unchanged.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let max_width = max_width.max(1);
    if width <= max_width {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Opaque pixel buffer handed from the codec engine to the presentation layer.
/// The bytes are shared, so publishing a displayed frame never copies them.
#[derive(Clone)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    data: Arc<[u8]>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// SIMD resize down to [`fit_width`]. Images already narrow enough come
    /// back as a clone sharing the same pixels.
    pub fn downscale_to_width(&self, max_width: u32) -> Result<FrameImage> {
        let (width, height) = fit_width(self.width, self.height, max_width);
        if (width, height) == (self.width, self.height) {
            return Ok(self.clone());
        }

        let pixel_type = self.format.resize_type();
        let src = Image::from_vec_u8(self.width, self.height, self.data.to_vec(), pixel_type)?;
        let mut dst = Image::new(width, height, pixel_type);
        fr::Resizer::new().resize(&src, &mut dst, None)?;

        Ok(FrameImage::new(width, height, self.format, dst.buffer().to_vec()))
    }
}

impl fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A decoded video frame and its presentation timestamp in stream seconds.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub image: FrameImage,
    pub pts: f64,
}

impl DecodedFrame {
    pub fn new(image: FrameImage, pts: f64) -> Self {
        Self { image, pts }
    }
}
