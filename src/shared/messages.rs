//! Message types sent from the inference worker to the interactive side

use uuid::Uuid;

use crate::vision::{AccelerationMode, ExecutionOutcome};

/// Messages sent from the worker (and the result slot) to the UI
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A new outcome was posted to the result slot
    Outcome(ExecutionOutcome),
    /// A detect request finished; `skipped` when no executor was live
    RequestFinished {
        id: Uuid,
        skipped: bool,
    },
    /// The executor was rebuilt for this mode
    Configured(AccelerationMode),
    /// The executor could not be rebuilt; the message is shown to the user
    ConstructionFailed {
        mode: AccelerationMode,
        message: String,
    },
}
