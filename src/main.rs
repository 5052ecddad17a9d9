//! OcrLens - on-device OCR demo
//!
//! Picks or captures a photo, runs the OCR executor on a dedicated worker
//! thread and writes the image with the recognized text outlined.

mod app;
mod capture;
mod config;
mod shared;
mod storage;
mod vision;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::OcrApp;
use crate::capture::ImageSource;
use crate::config::AppConfig;
use crate::storage::results::{save_result, ResultSummary};
use crate::vision::{AccelerationMode, ModelExecutionResult};

/// OcrLens - run OCR on a photo and outline what was found
#[derive(Parser, Debug)]
#[command(name = "ocr-lens")]
#[command(about = "Run on-device OCR on a photo and save the annotated result")]
struct Args {
    /// Image to process; `-` reads an encoded image (e.g. from a camera tool) on stdin
    image: Option<String>,

    /// Build the executor with the GPU delegate
    #[arg(long)]
    gpu: bool,

    /// Directory the annotated image and preview are written to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the result summary as JSON
    #[arg(long)]
    json: bool,

    /// Read commands from stdin: photo <path>, gpu on|off, detect, status, quit
    #[arg(short, long)]
    interactive: bool,

    /// Write the effective configuration to the config directory and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_or_create_config(args.config.as_deref());
    if args.gpu {
        config.inference.acceleration = AccelerationMode::Gpu;
    }

    if args.write_config {
        let path = storage::get_config_dir()?.join("config.toml");
        config::save_config(&config, &path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let output_dir = match args.output.clone().or_else(|| config.general.output_dir.clone()) {
        Some(dir) => dir,
        None => storage::get_results_dir()?,
    };

    info!("OcrLens starting (mode: {})", config.inference.acceleration);
    let app = OcrApp::with_text_regions(&config)?;

    if args.interactive {
        run_interactive(&app, &config, &output_dir)?;
    } else {
        run_once(&app, &config, &args, &output_dir)?;
    }

    info!("OcrLens shutdown complete");
    Ok(())
}

/// Load configuration from file or create default
fn load_or_create_config(explicit: Option<&Path>) -> AppConfig {
    if let Some(path) = explicit {
        match config::load_config(path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                return config;
            }
            Err(e) => warn!("{:#}; using defaults", e),
        }
    } else if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            if let Ok(config) = config::load_config(&config_path) {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn result_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.inference.result_timeout_secs.max(1))
}

/// Process a single image and exit
fn run_once(app: &OcrApp, config: &AppConfig, args: &Args, output_dir: &Path) -> Result<()> {
    let source = match (&args.image, &config.general.default_image) {
        (Some(arg), _) => ImageSource::from_arg(arg),
        (None, Some(path)) => ImageSource::File(path.clone()),
        (None, None) => bail!("No image given and no default image configured"),
    };

    app.acquire_image(&source)?;
    let timeout = result_timeout(config);
    app.wait_until_idle(timeout)?;

    let state = app.state();
    if !state.executor_ready {
        bail!("OCR executor is not ready: {}", state.status_text);
    }

    app.detect()?;
    app.wait_until_idle(timeout)?;

    let state = app.state();
    let Some(result) = state.last_result else {
        bail!("OCR failed on {}", source.label());
    };

    let summary = save_result(&result, &source.label(), output_dir, config.display.preview_size)?;
    print_summary(&state.status_text, &summary, args.json)?;
    Ok(())
}

fn print_summary(status_text: &str, summary: &ResultSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{}", status_text);
    println!("{}", summary.execution_log);
    if let Some(path) = &summary.result_path {
        println!("Result:  {}", path.display());
    }
    if let Some(path) = &summary.preview_path {
        println!("Preview: {}", path.display());
    }
    Ok(())
}

/// Whether `result` differs from the last saved one. The saved `Arc` is kept
/// alive, so a newer result can never reuse its address.
fn is_unsaved(
    last_saved: Option<&Arc<ModelExecutionResult>>,
    result: &Arc<ModelExecutionResult>,
) -> bool {
    !last_saved.is_some_and(|saved| Arc::ptr_eq(saved, result))
}

/// Line-driven stand-in for the photo / GPU / detect controls
fn run_interactive(app: &OcrApp, config: &AppConfig, output_dir: &Path) -> Result<()> {
    println!("Commands: photo <path>, gpu on|off, detect, status, quit");
    let timeout = result_timeout(config);
    let mut last_saved: Option<Arc<ModelExecutionResult>> = None;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "photo" => match parts.next() {
                Some(path) => {
                    if app.acquire_image(&ImageSource::File(PathBuf::from(path))).is_ok() {
                        println!("Selected {}", path);
                    }
                }
                None => println!("usage: photo <path>"),
            },
            "gpu" => match parts.next().map(str::parse::<AccelerationMode>) {
                Some(Ok(mode)) => {
                    app.set_acceleration(mode);
                    app.wait_until_idle(timeout)?;
                }
                _ => println!("usage: gpu on|off"),
            },
            "detect" => match app.detect() {
                Ok(_) => {
                    app.wait_until_idle(timeout)?;
                    let state = app.state();
                    if let Some(result) = &state.last_result {
                        if is_unsaved(last_saved.as_ref(), result) {
                            let source = state
                                .selected_image
                                .as_ref()
                                .map(|f| f.source.clone())
                                .unwrap_or_default();
                            let preview_size = config.display.preview_size;
                            let summary = save_result(result, &source, output_dir, preview_size)?;
                            if let Some(path) = &summary.result_path {
                                println!("Result:  {}", path.display());
                            }
                            last_saved = Some(result.clone());
                        }
                    }
                }
                Err(e) => println!("{}", e),
            },
            "status" => {
                app.pump_events();
                let state = app.state();
                println!(
                    "mode: {}  ready: {}  detect enabled: {}",
                    state.acceleration, state.executor_ready, state.controls_enabled
                );
            }
            "quit" | "exit" => break,
            other => {
                warn!("Unknown command: {}", other);
                continue;
            }
        }

        app.pump_events();
        let status = app.state().status_text;
        if !status.is_empty() {
            println!("> {}", status);
        }
    }

    Ok(())
}
