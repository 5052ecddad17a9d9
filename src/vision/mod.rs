//! Vision/OCR Layer
//!
//! Owns the OCR executor and runs it away from the interactive thread.
//! - `guardian`: lifecycle of the single swappable executor
//! - `worker`: the dedicated serial thread every executor operation runs on
//! - `dispatcher`: turns a detect request into exactly one completion
//! - `text_regions`: built-in CPU backend used when no external model is wired in

pub mod dispatcher;
pub mod error;
pub mod guardian;
pub mod text_regions;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::capture::frame::CapturedFrame;

pub use dispatcher::{Completion, Dispatcher, Submission};
pub use error::{ConstructionError, ExecutionError};
pub use guardian::ResourceGuardian;
pub use text_regions::{TextRegionConfig, TextRegionFactory};
pub use worker::{InferenceWorker, JobHandle};

/// Which hardware the executor is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelerationMode {
    /// General-purpose CPU execution
    #[default]
    Cpu,
    /// Specialized accelerator (GPU delegate)
    Gpu,
}

impl AccelerationMode {
    /// Mode selected by the "use GPU" toggle
    pub fn from_use_gpu(use_gpu: bool) -> Self {
        if use_gpu {
            AccelerationMode::Gpu
        } else {
            AccelerationMode::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccelerationMode::Cpu => "cpu",
            AccelerationMode::Gpu => "gpu",
        }
    }
}

impl fmt::Display for AccelerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccelerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" | "off" => Ok(AccelerationMode::Cpu),
            "gpu" | "on" => Ok(AccelerationMode::Gpu),
            other => Err(format!("unknown acceleration mode: {}", other)),
        }
    }
}

/// Output of a single successful OCR run
#[derive(Debug, Clone)]
pub struct ModelExecutionResult {
    /// Input image with the recognized items drawn on it
    pub result_image: RgbaImage,
    /// Free-form log of what the executor did
    pub execution_log: String,
    /// Recognized items and the color each one was drawn with
    pub items_found: BTreeMap<String, Rgba<u8>>,
}

/// Terminal outcome of one submitted request
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The computation finished and produced a result
    Success(Arc<ModelExecutionResult>),
    /// The computation failed; the cause was logged on the worker
    Failure,
}

impl ExecutionOutcome {
    /// The result, or `None` for a failed run
    pub fn result(&self) -> Option<&Arc<ModelExecutionResult>> {
        match self {
            ExecutionOutcome::Success(result) => Some(result),
            ExecutionOutcome::Failure => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

/// A constructed, ready-to-run OCR model
///
/// Instances are created, used and closed on the inference worker thread only,
/// so implementations do not need to be `Send`.
pub trait OcrExecutor {
    /// Run recognition on one image
    fn execute(&mut self, image: &CapturedFrame) -> Result<ModelExecutionResult, ExecutionError>;

    /// Release the resources held by the model. Called before the executor is
    /// dropped, both on rebuild and on shutdown.
    fn close(&mut self);
}

/// Builds executors for a given acceleration mode
///
/// The factory is moved onto the inference worker, which is the only thread
/// that ever calls it.
pub trait ExecutorFactory: Send {
    fn create(&mut self, mode: AccelerationMode) -> Result<Box<dyn OcrExecutor>, ConstructionError>;
}

impl<F> ExecutorFactory for F
where
    F: FnMut(AccelerationMode) -> Result<Box<dyn OcrExecutor>, ConstructionError> + Send,
{
    fn create(
        &mut self,
        mode: AccelerationMode,
    ) -> Result<Box<dyn OcrExecutor>, ConstructionError> {
        self(mode)
    }
}
