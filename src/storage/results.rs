//! Writing OCR results to disk

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::vision::ModelExecutionResult;

/// One recognized item as written to the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub label: String,
    /// `#rrggbb`
    pub color: String,
}

/// JSON summary of a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Where the input image came from
    pub source: String,
    pub items: Vec<ItemSummary>,
    pub execution_log: String,
    pub result_path: Option<PathBuf>,
    pub preview_path: Option<PathBuf>,
}

impl ResultSummary {
    pub fn new(source: &str, result: &ModelExecutionResult) -> Self {
        Self {
            source: source.to_string(),
            items: result
                .items_found
                .iter()
                .map(|(label, color)| ItemSummary {
                    label: label.clone(),
                    color: color_hex(*color),
                })
                .collect(),
            execution_log: result.execution_log.clone(),
            result_path: None,
            preview_path: None,
        }
    }
}

/// Format a color as `#rrggbb`
pub fn color_hex(color: Rgba<u8>) -> String {
    let [r, g, b, _] = color.0;
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Scale the result to fit inside a `size` x `size` square, keeping the aspect ratio
pub fn render_preview(image: &RgbaImage, size: u32) -> RgbaImage {
    let size = size.max(1);
    DynamicImage::ImageRgba8(image.clone())
        .resize(size, size, FilterType::Triangle)
        .to_rgba8()
}

/// File stem used for the outputs of an image from `source`
fn output_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("capture")
        .to_string()
}

/// Write the annotated image and its preview into `dir`
pub fn save_result(
    result: &ModelExecutionResult,
    source: &str,
    dir: &Path,
    preview_size: u32,
) -> Result<ResultSummary> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let stem = output_stem(source);
    let result_path = dir.join(format!("{}-ocr.png", stem));
    let preview_path = dir.join(format!("{}-preview.png", stem));

    result
        .result_image
        .save(&result_path)
        .with_context(|| format!("Failed to write result image {:?}", result_path))?;
    render_preview(&result.result_image, preview_size)
        .save(&preview_path)
        .with_context(|| format!("Failed to write preview image {:?}", preview_path))?;

    info!("Saved OCR result to {:?}", result_path);

    let mut summary = ResultSummary::new(source, result);
    summary.result_path = Some(result_path);
    summary.preview_path = Some(preview_path);
    Ok(summary)
}
