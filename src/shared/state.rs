//! State of the interactive side

use std::sync::Arc;

use crate::capture::frame::CapturedFrame;
use crate::shared::UiEvent;
use crate::vision::{AccelerationMode, ExecutionOutcome, ModelExecutionResult};

/// Everything the interactive side renders
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Status line: recognized items, or the last construction error
    pub status_text: String,
    /// Whether the detect control accepts input
    pub controls_enabled: bool,
    /// Mode selected by the GPU toggle
    pub acceleration: AccelerationMode,
    /// Whether the worker reported a live executor
    pub executor_ready: bool,
    /// Image the next detect request will use
    pub selected_image: Option<Arc<CapturedFrame>>,
    /// Latest successful result
    pub last_result: Option<Arc<ModelExecutionResult>>,
    /// Detect requests submitted and not yet finished
    pub pending_requests: usize,
    /// Executor rebuilds scheduled and not yet finished
    pub pending_rebuilds: usize,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl UiState {
    pub fn new(acceleration: AccelerationMode) -> Self {
        Self {
            acceleration,
            controls_enabled: true,
            ..Default::default()
        }
    }

    /// Apply one worker event
    pub fn apply(&mut self, event: &UiEvent) {
        match event {
            UiEvent::Outcome(ExecutionOutcome::Success(result)) => {
                self.status_text = format_items(result);
                self.last_result = Some(result.clone());
                self.controls_enabled = true;
            }
            UiEvent::Outcome(ExecutionOutcome::Failure) => {
                // Result view stays as it was
                self.controls_enabled = true;
            }
            UiEvent::RequestFinished { .. } => {
                self.pending_requests = self.pending_requests.saturating_sub(1);
                self.controls_enabled = true;
            }
            UiEvent::Configured(mode) => {
                self.pending_rebuilds = self.pending_rebuilds.saturating_sub(1);
                self.executor_ready = true;
                self.acceleration = *mode;
                self.clear_error();
            }
            UiEvent::ConstructionFailed { message, .. } => {
                self.pending_rebuilds = self.pending_rebuilds.saturating_sub(1);
                self.executor_ready = false;
                self.status_text = message.clone();
                self.set_error(message.clone());
            }
        }
    }

    /// Disable input while a request is outstanding
    pub fn begin_request(&mut self) {
        self.controls_enabled = false;
        self.pending_requests += 1;
    }

    /// Record that an executor rebuild was scheduled
    pub fn begin_rebuild(&mut self) {
        self.pending_rebuilds += 1;
    }

    /// No detect request or rebuild is outstanding
    pub fn is_idle(&self) -> bool {
        self.pending_requests == 0 && self.pending_rebuilds == 0
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}

/// Render the found item names the way the status line shows them
pub fn format_items(result: &ModelExecutionResult) -> String {
    let keys: Vec<&str> = result.items_found.keys().map(String::as_str).collect();
    format!("[{}]", keys.join(", "))
}
