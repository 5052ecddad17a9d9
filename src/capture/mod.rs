//! Image Acquisition Layer
//!
//! Gets the photo to run OCR on: either selected from disk or captured by an
//! external camera tool and piped in on stdin.

pub mod frame;

use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::capture::frame::CapturedFrame;

/// Where to take the next image from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image file picked from disk
    File(PathBuf),
    /// Encoded image bytes piped in on stdin
    Stdin,
}

impl ImageSource {
    /// Parse a command-line argument; `-` means stdin
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            ImageSource::Stdin
        } else {
            ImageSource::File(PathBuf::from(arg))
        }
    }

    /// Short label used in logs and as the frame source
    pub fn label(&self) -> String {
        match self {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Stdin => "stdin".to_string(),
        }
    }
}

/// Failure to obtain or decode an image
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("failed to read image from {source_label}: {error}")]
    Io {
        source_label: String,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to decode image from {source_label}: {error}")]
    Decode {
        source_label: String,
        #[source]
        error: image::ImageError,
    },
    #[error("image from {0} has no pixels")]
    Empty(String),
}

/// Acquire and decode an image from `source`
pub fn acquire(source: &ImageSource) -> Result<CapturedFrame, AcquireError> {
    match source {
        ImageSource::File(path) => load_file(path),
        ImageSource::Stdin => read_encoded(std::io::stdin().lock(), "stdin"),
    }
}

/// Load an image file
pub fn load_file(path: &Path) -> Result<CapturedFrame, AcquireError> {
    let label = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|error| AcquireError::Io {
        source_label: label.clone(),
        error,
    })?;
    decode(&bytes, &label)
}

/// Read an encoded image (PNG, JPEG, ...) from any reader
pub fn read_encoded(mut reader: impl Read, label: &str) -> Result<CapturedFrame, AcquireError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|error| AcquireError::Io {
            source_label: label.to_string(),
            error,
        })?;
    decode(&bytes, label)
}

/// Decode in-memory image bytes into an RGBA frame
pub fn decode(bytes: &[u8], label: &str) -> Result<CapturedFrame, AcquireError> {
    debug!("Decoding {} bytes from {}", bytes.len(), label);
    let image = image::load_from_memory(bytes).map_err(|error| AcquireError::Decode {
        source_label: label.to_string(),
        error,
    })?;

    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(AcquireError::Empty(label.to_string()));
    }

    info!("Acquired {}x{} image from {}", rgba.width(), rgba.height(), label);
    Ok(CapturedFrame::new(rgba, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_source_from_arg() {
        assert_eq!(ImageSource::from_arg("-"), ImageSource::Stdin);
        assert_eq!(
            ImageSource::from_arg("photo.jpg"),
            ImageSource::File(PathBuf::from("photo.jpg"))
        );
        assert_eq!(ImageSource::Stdin.label(), "stdin");
    }

    #[test]
    fn test_read_encoded_png() {
        let frame = read_encoded(Cursor::new(png_bytes(3, 2)), "camera").unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.source, "camera");
        assert_eq!(frame.image.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(5, 5)).unwrap();

        let frame = acquire(&ImageSource::File(path.clone())).unwrap();
        assert_eq!(frame.dimensions(), (5, 5));
        assert_eq!(frame.source, path.display().to_string());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_file(Path::new("/nonexistent/photo.png"));
        assert!(matches!(result, Err(AcquireError::Io { .. })));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = decode(b"definitely not an image", "garbage");
        assert!(matches!(result, Err(AcquireError::Decode { .. })));
    }
}
