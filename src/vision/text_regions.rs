//! Built-in text region backend
//!
//! A CPU-only executor that finds blocks of ink on the page and draws a
//! colored box around each one. It stands in for a real OCR model so the
//! application runs without one.

use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::morphology;
use imageproc::rect::Rect;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use super::{
    AccelerationMode, ConstructionError, ExecutionError, ExecutorFactory, ModelExecutionResult,
    OcrExecutor,
};
use crate::capture::frame::CapturedFrame;

/// Box colors, cycled per region
const PALETTE: [Rgba<u8>; 8] = [
    Rgba([230, 25, 75, 255]),
    Rgba([60, 180, 75, 255]),
    Rgba([0, 130, 200, 255]),
    Rgba([245, 130, 48, 255]),
    Rgba([145, 30, 180, 255]),
    Rgba([70, 240, 240, 255]),
    Rgba([240, 50, 230, 255]),
    Rgba([128, 128, 0, 255]),
];

/// Regions covering more than this share of the image are page borders, not text
const MAX_REGION_COVERAGE: f32 = 0.9;

/// Tuning for the text region backend
#[derive(Debug, Clone)]
pub struct TextRegionConfig {
    /// Minimum region width in pixels
    pub min_width: u32,
    /// Minimum region height in pixels
    pub min_height: u32,
    /// Dilation radius used to merge glyphs into words and lines
    pub dilation_radius: u8,
    /// Maximum number of regions reported
    pub max_regions: usize,
    /// Ink threshold as a fraction of the mean background luminance
    pub ink_ratio: f32,
    /// Outline thickness in pixels
    pub box_thickness: u32,
    /// Whether a GPU delegate may be requested
    pub gpu_available: bool,
}

impl Default for TextRegionConfig {
    fn default() -> Self {
        Self {
            min_width: 4,
            min_height: 4,
            dilation_radius: 3,
            max_regions: 64,
            ink_ratio: 0.75,
            box_thickness: 2,
            gpu_available: false,
        }
    }
}

/// Builds `TextRegionExecutor`s
#[derive(Debug, Clone, Default)]
pub struct TextRegionFactory {
    config: TextRegionConfig,
}

impl TextRegionFactory {
    pub fn new(config: TextRegionConfig) -> Self {
        Self { config }
    }
}

impl ExecutorFactory for TextRegionFactory {
    fn create(
        &mut self,
        mode: AccelerationMode,
    ) -> Result<Box<dyn OcrExecutor>, ConstructionError> {
        if mode == AccelerationMode::Gpu && !self.config.gpu_available {
            return Err(ConstructionError::new(
                mode,
                "GPU delegate is not available for the text region backend",
            ));
        }

        info!("Text region backend created (mode: {})", mode);
        Ok(Box::new(TextRegionExecutor {
            config: self.config.clone(),
            mode,
            open: true,
        }))
    }
}

/// Detected block of ink, in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Executor that outlines blocks of text
pub struct TextRegionExecutor {
    config: TextRegionConfig,
    mode: AccelerationMode,
    open: bool,
}

impl TextRegionExecutor {
    /// Find text-like regions in reading order (top to bottom, left to right)
    pub fn detect_regions(&self, image: &RgbaImage) -> Vec<Region> {
        let (width, height) = image.dimensions();
        let mask = ink_mask(&imageops::grayscale(image), self.config.ink_ratio);
        let merged = if self.config.dilation_radius > 0 {
            morphology::dilate(&mask, Norm::LInf, self.config.dilation_radius)
        } else {
            mask
        };

        let image_area = (width as f32) * (height as f32);
        let mut regions: Vec<Region> = find_contours::<u32>(&merged)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let min_x = c.points.iter().map(|p| p.x).min()?;
                let max_x = c.points.iter().map(|p| p.x).max()?;
                let min_y = c.points.iter().map(|p| p.y).min()?;
                let max_y = c.points.iter().map(|p| p.y).max()?;
                Some(Region {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                })
            })
            .filter(|r| {
                r.width >= self.config.min_width.max(1) && r.height >= self.config.min_height.max(1)
            })
            .filter(|r| (r.width as f32 * r.height as f32) < image_area * MAX_REGION_COVERAGE)
            .collect();

        regions.sort_by_key(|r| (r.y, r.x));
        regions.truncate(self.config.max_regions);
        regions
    }
}

impl OcrExecutor for TextRegionExecutor {
    fn execute(&mut self, frame: &CapturedFrame) -> Result<ModelExecutionResult, ExecutionError> {
        if !self.open {
            return Err(ExecutionError::Failed("executor has been closed".to_string()));
        }
        if frame.is_empty() {
            return Err(ExecutionError::InvalidInput(format!(
                "{}x{} frame from {}",
                frame.width(),
                frame.height(),
                frame.source
            )));
        }

        let start = Instant::now();
        let regions = self.detect_regions(&frame.image);

        let mut result_image = frame.image.clone();
        let mut items_found = BTreeMap::new();
        for (index, region) in regions.iter().enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            draw_outline(&mut result_image, region, color, self.config.box_thickness);
            items_found.insert(format!("region-{:02}", index + 1), color);
        }

        let execution_log = format!(
            "text regions: {} found in {}x{} image ({} backend, {:?})",
            regions.len(),
            frame.width(),
            frame.height(),
            self.mode,
            start.elapsed()
        );
        debug!("{}", execution_log);

        Ok(ModelExecutionResult {
            result_image,
            execution_log,
            items_found,
        })
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Mark ink pixels (255) against the background (0)
///
/// Dark ink on a light page is the default; a mostly dark image is treated
/// as light text on a dark background.
fn ink_mask(gray: &GrayImage, ink_ratio: f32) -> GrayImage {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let mean = (sum / count) as f32;
    let light_text = mean < 128.0;

    let dark_cutoff = mean * ink_ratio;
    let light_cutoff = mean + (255.0 - mean) * (1.0 - ink_ratio);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f32;
        let is_ink = if light_text {
            value > light_cutoff
        } else {
            value < dark_cutoff
        };
        if is_ink {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Draw a rectangle outline `thickness` pixels wide, growing outwards
fn draw_outline(image: &mut RgbaImage, region: &Region, color: Rgba<u8>, thickness: u32) {
    for i in 0..thickness.max(1) {
        let x = region.x as i32 - i as i32;
        let y = region.y as i32 - i as i32;
        let rect = Rect::at(x, y).of_size(region.width + 2 * i, region.height + 2 * i);
        draw_hollow_rect_mut(image, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// White page with two black "words" on separate lines
    fn page_with_two_words() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(200, 100, WHITE);
        draw_filled_rect_mut(&mut img, Rect::at(20, 20).of_size(60, 12), BLACK);
        draw_filled_rect_mut(&mut img, Rect::at(30, 60).of_size(80, 12), BLACK);
        img
    }

    fn executor(config: TextRegionConfig) -> Box<dyn OcrExecutor> {
        TextRegionFactory::new(config).create(AccelerationMode::Cpu).unwrap()
    }

    #[test]
    fn test_gpu_unavailable_fails_construction() {
        let mut factory = TextRegionFactory::default();
        let err = factory.create(AccelerationMode::Gpu).err().unwrap();
        assert_eq!(err.mode, AccelerationMode::Gpu);
        assert!(err.message.contains("GPU"));
    }

    #[test]
    fn test_gpu_allowed_when_configured() {
        let mut factory = TextRegionFactory::new(TextRegionConfig {
            gpu_available: true,
            ..Default::default()
        });
        assert!(factory.create(AccelerationMode::Gpu).is_ok());
    }

    #[test]
    fn test_detects_regions_in_reading_order() {
        let exec = TextRegionExecutor {
            config: TextRegionConfig::default(),
            mode: AccelerationMode::Cpu,
            open: true,
        };
        let regions = exec.detect_regions(&page_with_two_words());

        assert_eq!(regions.len(), 2);
        assert!(regions[0].y < regions[1].y);
        // Dilation grows the box by the radius on each side
        assert_eq!(regions[0].x, 17);
        assert_eq!(regions[0].width, 66);
    }

    #[test]
    fn test_execute_labels_and_draws_regions() {
        let mut exec = executor(TextRegionConfig::default());
        let frame = CapturedFrame::new(page_with_two_words(), "page");

        let result = exec.execute(&frame).unwrap();
        let keys: Vec<_> = result.items_found.keys().cloned().collect();
        assert_eq!(keys, vec!["region-01", "region-02"]);
        assert_eq!(result.items_found["region-01"], PALETTE[0]);
        assert_eq!(result.result_image.dimensions(), (200, 100));
        // The outline of the first region was drawn over white background
        assert_eq!(result.result_image.get_pixel(17, 17), &PALETTE[0]);
        assert!(result.execution_log.contains("2 found"));
    }

    #[test]
    fn test_blank_page_finds_nothing() {
        let mut exec = executor(TextRegionConfig::default());
        let frame = CapturedFrame::new(RgbaImage::from_pixel(50, 50, WHITE), "blank");
        let result = exec.execute(&frame).unwrap();
        assert!(result.items_found.is_empty());
    }

    #[test]
    fn test_light_text_on_dark_background() {
        let mut img = RgbaImage::from_pixel(120, 60, BLACK);
        draw_filled_rect_mut(&mut img, Rect::at(10, 20).of_size(50, 10), WHITE);
        let mut exec = executor(TextRegionConfig::default());

        let result = exec.execute(&CapturedFrame::new(img, "dark")).unwrap();
        assert_eq!(result.items_found.len(), 1);
    }

    #[test]
    fn test_max_regions_truncates() {
        let mut exec = executor(TextRegionConfig {
            max_regions: 1,
            ..Default::default()
        });
        let result = exec
            .execute(&CapturedFrame::new(page_with_two_words(), "page"))
            .unwrap();
        assert_eq!(result.items_found.len(), 1);
    }

    #[test]
    fn test_empty_frame_is_invalid_input() {
        let mut exec = executor(TextRegionConfig::default());
        let frame = CapturedFrame::new(RgbaImage::new(0, 0), "empty");
        assert!(matches!(exec.execute(&frame), Err(ExecutionError::InvalidInput(_))));
    }

    #[test]
    fn test_closed_executor_refuses_work() {
        let mut exec = executor(TextRegionConfig::default());
        exec.close();
        let frame = CapturedFrame::new(page_with_two_words(), "page");
        assert!(exec.execute(&frame).is_err());
    }
}
