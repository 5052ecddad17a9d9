//! Frame data structures for acquired images

use image::RgbaImage;
use std::time::Instant;

/// A decoded image ready to be handed to the OCR executor
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixel buffer
    pub image: RgbaImage,
    /// Where the frame came from (file path, "stdin", ...)
    pub source: String,
    /// When the frame was acquired
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage, source: impl Into<String>) -> Self {
        Self {
            image,
            source: source.into(),
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether the frame has no pixels
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}
