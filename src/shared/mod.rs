//! Shared state and messaging between the inference worker and the interactive side
//!
//! This module provides the result slot, the worker-to-UI messages and the
//! state the interactive side renders from.

pub mod messages;
pub mod observable;
pub mod state;

pub use messages::UiEvent;
pub use observable::{LastValueSlot, Subscription};
pub use state::UiState;
