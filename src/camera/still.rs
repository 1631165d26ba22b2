/// Still capture: draw the current video frame into a canvas and encode it

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbaImage};

use super::video::VideoSurface;
use crate::state::data::EncodedImage;

/// Canvas size used when the video reports no native resolution
const FALLBACK_WIDTH: u32 = 640;
const FALLBACK_HEIGHT: u32 = 480;

/// Fixed encoding quality for stills (0.0 - 1.0)
pub const JPEG_QUALITY: f32 = 0.9;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Encoder task failed: {0}")]
    Task(String),
}

/// Offscreen drawing surface
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Blank (opaque black) canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255])),
        }
    }

    /// Canvas matching the video's native resolution, or 640×480 if unknown
    pub fn sized_for(video: &VideoSurface) -> Self {
        let width = video.video_width();
        let height = video.video_height();
        if width == 0 || height == 0 {
            Self::new(FALLBACK_WIDTH, FALLBACK_HEIGHT)
        } else {
            Self::new(width, height)
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Draw `frame` stretched over the whole canvas
    pub fn draw_frame(&mut self, frame: &RgbaImage) {
        if frame.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(frame.as_raw());
        } else {
            self.image = imageops::resize(frame, self.width(), self.height(), FilterType::Triangle);
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }
}

/// Encode the canvas as JPEG on a blocking thread
pub async fn encode_jpeg(canvas: Canvas, quality: f32) -> Result<EncodedImage, EncodeError> {
    tokio::task::spawn_blocking(move || encode_jpeg_blocking(&canvas, quality))
        .await
        .map_err(|e| EncodeError::Task(e.to_string()))?
}

/// Blocking version of the JPEG encoder
pub fn encode_jpeg_blocking(canvas: &Canvas, quality: f32) -> Result<EncodedImage, EncodeError> {
    let (width, height) = (canvas.width(), canvas.height());
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(canvas.image.clone()).to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality_percent(quality));
        encoder
            .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| EncodeError::Encode(e.to_string()))?;
    }

    let bytes = buffer.into_inner();
    tracing::debug!("Encoded {}x{} still ({} bytes)", width, height, bytes.len());

    Ok(EncodedImage {
        bytes: Arc::new(bytes),
        mime_type: JPEG_MIME.to_string(),
        width,
        height,
    })
}

/// Map a 0.0-1.0 quality onto the encoder's 1-100 scale
fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStream;

    #[test]
    fn test_quality_mapping() {
        assert_eq!(quality_percent(JPEG_QUALITY), 90);
        assert_eq!(quality_percent(0.0), 1);
        assert_eq!(quality_percent(2.0), 100);
    }

    #[test]
    fn test_canvas_falls_back_to_640x480() {
        let canvas = Canvas::sized_for(&VideoSurface::new());
        assert_eq!((canvas.width(), canvas.height()), (640, 480));
    }

    #[test]
    fn test_canvas_matches_native_resolution() {
        let mut video = VideoSurface::new();
        video.attach(Arc::new(FakeStream::new("s", 320, 240)));
        let canvas = Canvas::sized_for(&video);
        assert_eq!((canvas.width(), canvas.height()), (320, 240));
    }

    #[test]
    fn test_draw_frame_scales_to_canvas() {
        let frame = RgbaImage::from_pixel(10, 10, image::Rgba([200, 10, 10, 255]));
        let mut canvas = Canvas::new(20, 5);
        canvas.draw_frame(&frame);

        assert_eq!(canvas.pixels().dimensions(), (20, 5));
        assert_eq!(canvas.pixels().get_pixel(10, 2)[0], 200);
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let mut canvas = Canvas::new(64, 48);
        canvas.draw_frame(&RgbaImage::from_pixel(64, 48, image::Rgba([30, 60, 90, 255])));

        let encoded = encode_jpeg_blocking(&canvas, JPEG_QUALITY).unwrap();
        assert_eq!(encoded.mime_type, "image/jpeg");
        assert_eq!((encoded.width, encoded.height), (64, 48));
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(encoded.byte_len(), encoded.bytes.len() as u64);

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[tokio::test]
    async fn test_async_encode_matches_blocking() {
        let canvas = Canvas::new(16, 16);
        let encoded = encode_jpeg(canvas, JPEG_QUALITY).await.unwrap();
        assert_eq!((encoded.width, encoded.height), (16, 16));
    }
}
