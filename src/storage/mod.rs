//! Storage Layer
//!
//! Resolves the application directories and writes OCR results to disk.

pub mod results;

use anyhow::Result;
use std::path::PathBuf;

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "ocrlens", "OcrLens")
        .ok_or_else(|| anyhow::anyhow!("Could not determine application directories"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Get the default directory annotated results are written to
pub fn get_results_dir() -> Result<PathBuf> {
    let results_dir = get_data_dir()?.join("results");
    std::fs::create_dir_all(&results_dir)?;

    Ok(results_dir)
}
