//! Error types for executor construction and execution

use thiserror::Error;

use super::AccelerationMode;

/// The executor could not be built under the requested acceleration mode
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConstructionError {
    /// Mode the construction was attempted with
    pub mode: AccelerationMode,
    /// Human-readable cause, shown to the user as status text
    pub message: String,
}

impl ConstructionError {
    pub fn new(mode: AccelerationMode, message: impl Into<String>) -> Self {
        Self {
            mode,
            message: message.into(),
        }
    }
}

/// The executor was built, but running it on a given image failed
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Input image cannot be processed (empty, wrong size, ...)
    #[error("invalid input image: {0}")]
    InvalidInput(String),
    /// The computation reported an error
    #[error("execution failed: {0}")]
    Failed(String),
    /// The computation panicked on the worker
    #[error("execution panicked: {0}")]
    Panicked(String),
}

impl ExecutionError {
    /// Build a `Panicked` error from a payload caught with `catch_unwind`
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        ExecutionError::Panicked(message)
    }
}
