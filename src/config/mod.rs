//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::{AccelerationMode, TextRegionConfig};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Inference settings
    pub inference: InferenceSettings,
    /// Built-in text region backend settings
    pub detection: DetectionSettings,
    /// Result display settings
    pub display: DisplaySettings,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Image used when none is given on the command line
    pub default_image: Option<PathBuf>,
    /// Where annotated results are written (defaults to the data directory)
    pub output_dir: Option<PathBuf>,
}

/// Inference-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Acceleration mode the executor is first built with
    pub acceleration: AccelerationMode,
    /// How long to wait for a detect request before giving up, in seconds
    pub result_timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            acceleration: AccelerationMode::Cpu,
            result_timeout_secs: 30,
        }
    }
}

/// Tuning for the built-in text region backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum region width in pixels
    pub min_region_width: u32,
    /// Minimum region height in pixels
    pub min_region_height: u32,
    /// Dilation radius used to merge glyphs
    pub dilation_radius: u8,
    /// Maximum number of regions reported
    pub max_regions: usize,
    /// Ink threshold as a fraction of the mean luminance
    pub ink_ratio: f32,
    /// Outline thickness in pixels
    pub box_thickness: u32,
    /// Allow building the backend in GPU mode
    pub gpu_available: bool,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        let defaults = TextRegionConfig::default();
        Self {
            min_region_width: defaults.min_width,
            min_region_height: defaults.min_height,
            dilation_radius: defaults.dilation_radius,
            max_regions: defaults.max_regions,
            ink_ratio: defaults.ink_ratio,
            box_thickness: defaults.box_thickness,
            gpu_available: defaults.gpu_available,
        }
    }
}

impl DetectionSettings {
    /// Convert to the backend's own configuration
    pub fn to_backend_config(&self) -> TextRegionConfig {
        TextRegionConfig {
            min_width: self.min_region_width,
            min_height: self.min_region_height,
            dilation_radius: self.dilation_radius,
            max_regions: self.max_regions,
            ink_ratio: self.ink_ratio.clamp(0.05, 1.0),
            box_thickness: self.box_thickness,
            gpu_available: self.gpu_available,
        }
    }
}

/// Result display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Side of the square the result preview is fit into
    pub preview_size: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { preview_size: 250 }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check general defaults
        assert!(config.general.default_image.is_none());
        assert!(config.general.output_dir.is_none());

        // Check inference defaults
        assert_eq!(config.inference.acceleration, AccelerationMode::Cpu);
        assert_eq!(config.inference.result_timeout_secs, 30);

        // Check detection defaults
        assert_eq!(config.detection.dilation_radius, 3);
        assert_eq!(config.detection.max_regions, 64);
        assert!(!config.detection.gpu_available);

        // Check display defaults
        assert_eq!(config.display.preview_size, 250);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Verify values match
        assert_eq!(config.inference.acceleration, parsed.inference.acceleration);
        assert_eq!(config.detection.max_regions, parsed.detection.max_regions);
        assert_eq!(config.display.preview_size, parsed.display.preview_size);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [inference]
            acceleration = "gpu"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.inference.acceleration, AccelerationMode::Gpu);
        assert_eq!(parsed.inference.result_timeout_secs, 30);
        assert_eq!(parsed.display.preview_size, 250);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.general.default_image = Some(PathBuf::from("receipt.jpg"));
        config.detection.min_region_height = 12;
        config.detection.gpu_available = true;

        // Serialize and deserialize
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.general.default_image, Some(PathBuf::from("receipt.jpg")));
        assert_eq!(parsed.detection.min_region_height, 12);
        assert!(parsed.detection.gpu_available);
    }

    #[test]
    fn test_detection_settings_to_backend_config() {
        let settings = DetectionSettings {
            ink_ratio: 5.0,
            max_regions: 3,
            ..Default::default()
        };
        let backend = settings.to_backend_config();
        assert_eq!(backend.max_regions, 3);
        assert!((backend.ink_ratio - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.inference.acceleration = AccelerationMode::Gpu;

        // Create a temporary file
        let temp_file = NamedTempFile::new().unwrap();

        // Save config
        save_config(&config, temp_file.path()).unwrap();

        // Load config
        let loaded = load_config(temp_file.path()).unwrap();

        // Verify
        assert_eq!(loaded.inference.acceleration, AccelerationMode::Gpu);
        assert_eq!(config.display.preview_size, loaded.display.preview_size);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
