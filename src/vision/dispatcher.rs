//! Execution dispatcher
//!
//! Sends one OCR request to the inference worker and guarantees exactly one
//! completion per request: either the request is skipped because no executor
//! is live, or an outcome (success or failure) is posted to the result slot.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use anyhow::Result;

use super::{ExecutionError, ExecutionOutcome, InferenceWorker, JobHandle};
use crate::capture::frame::CapturedFrame;
use crate::shared::LastValueSlot;

/// How a submitted request ended
#[derive(Debug, Clone)]
pub enum Completion {
    /// No executor was live; nothing was posted
    Skipped,
    /// The executor ran and this outcome was posted to the slot
    Delivered(ExecutionOutcome),
}

impl Completion {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Completion::Skipped)
    }

    /// The delivered outcome, if the request was not skipped
    pub fn outcome(&self) -> Option<&ExecutionOutcome> {
        match self {
            Completion::Skipped => None,
            Completion::Delivered(outcome) => Some(outcome),
        }
    }
}

/// One detect request
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub id: Uuid,
    pub image: Arc<CapturedFrame>,
}

impl ExecutionRequest {
    pub fn new(image: Arc<CapturedFrame>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
        }
    }
}

/// Handle to a submitted request
pub struct Submission {
    /// Request identifier, also used in log lines
    pub id: Uuid,
    handle: JobHandle<Completion>,
}

impl Submission {
    /// Block until the request completes
    pub fn wait(self) -> Result<Completion> {
        self.handle.wait()
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<Completion> {
        self.handle.wait_timeout(timeout)
    }

    /// Non-blocking check for completion
    pub fn try_take(&self) -> Option<Completion> {
        self.handle.try_take()
    }
}

/// Runs requests on the inference worker and publishes their outcomes
pub struct Dispatcher {
    worker: Arc<InferenceWorker>,
    results: LastValueSlot<ExecutionOutcome>,
}

impl Dispatcher {
    pub fn new(worker: Arc<InferenceWorker>, results: LastValueSlot<ExecutionOutcome>) -> Self {
        Self { worker, results }
    }

    /// Slot the outcomes are posted to
    pub fn results(&self) -> &LastValueSlot<ExecutionOutcome> {
        &self.results
    }

    /// Queue OCR on `image`. Returns immediately.
    pub fn submit(&self, image: Arc<CapturedFrame>) -> Submission {
        self.submit_with(ExecutionRequest::new(image), |_| {})
    }

    /// Queue a request and call `on_complete` on the worker once it finishes
    ///
    /// A panic in `on_complete` is logged; the completion is still returned
    /// through the `Submission`.
    pub fn submit_with(
        &self,
        request: ExecutionRequest,
        on_complete: impl FnOnce(&Completion) + Send + 'static,
    ) -> Submission {
        let id = request.id;
        let results = self.results.clone();
        debug!("Submitting OCR request {}", id);

        let handle = self.worker.schedule(move |guardian| {
            let mode = guardian.mode();
            let ran = guardian.run_exclusive(|executor| {
                let start = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| executor.execute(&request.image)))
                    .unwrap_or_else(|payload| Err(ExecutionError::from_panic(payload)));
                (result, start.elapsed())
            });

            let completion = match ran {
                None => {
                    warn!(
                        "Skipping OCR request {} since the executor has not been initialized",
                        id
                    );
                    Completion::Skipped
                }
                Some((Ok(result), elapsed)) => {
                    info!(
                        "OCR request {} finished in {:?} (mode: {:?}): {} items found",
                        id,
                        elapsed,
                        mode,
                        result.items_found.len()
                    );
                    let outcome = ExecutionOutcome::Success(Arc::new(result));
                    results.post(outcome.clone());
                    Completion::Delivered(outcome)
                }
                Some((Err(e), _)) => {
                    error!("Fail to execute OCR request {}: {}", id, e);
                    results.post(ExecutionOutcome::Failure);
                    Completion::Delivered(ExecutionOutcome::Failure)
                }
            };

            if catch_unwind(AssertUnwindSafe(|| on_complete(&completion))).is_err() {
                error!("Completion callback for OCR request {} panicked", id);
            }
            completion
        });

        Submission { id, handle }
    }
}
