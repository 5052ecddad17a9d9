//! Application Coordinator
//!
//! Wires the interactive controls (pick image, toggle acceleration, detect)
//! to the inference worker, and folds worker events back into `UiState`.

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::capture::{self, frame::CapturedFrame, ImageSource};
use crate::config::AppConfig;
use crate::shared::{LastValueSlot, Subscription, UiEvent, UiState};
use crate::vision::dispatcher::ExecutionRequest;
use crate::vision::{
    AccelerationMode, Dispatcher, ExecutionOutcome, ExecutorFactory, InferenceWorker,
    TextRegionFactory,
};

/// How often `wait_until_idle` checks that the worker is still alive
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Main application coordinator
pub struct OcrApp {
    /// State the interactive side renders from
    state: Arc<RwLock<UiState>>,
    /// Worker that owns the OCR executor
    worker: Arc<InferenceWorker>,
    /// Runs detect requests on the worker
    dispatcher: Dispatcher,
    /// Events from the worker, drained by `pump_events`
    events_tx: Sender<UiEvent>,
    events_rx: Receiver<UiEvent>,
    /// Forwards posted outcomes into the event channel
    _results_subscription: Subscription<ExecutionOutcome>,
}

impl OcrApp {
    /// Create the coordinator and schedule the first executor build
    pub fn new(config: &AppConfig, factory: impl ExecutorFactory + 'static) -> Result<Self> {
        let worker = Arc::new(InferenceWorker::spawn(factory)?);
        let (events_tx, events_rx) = unbounded();

        let results = LastValueSlot::new();
        let outcome_tx = events_tx.clone();
        let results_subscription = results.subscribe(move |outcome: &ExecutionOutcome| {
            let _ = outcome_tx.send(UiEvent::Outcome(outcome.clone()));
        });

        let mode = config.inference.acceleration;
        let app = Self {
            state: Arc::new(RwLock::new(UiState::new(mode))),
            dispatcher: Dispatcher::new(worker.clone(), results),
            worker,
            events_tx,
            events_rx,
            _results_subscription: results_subscription,
        };

        app.schedule_configure(mode);
        Ok(app)
    }

    /// Create the coordinator backed by the built-in text region executor
    pub fn with_text_regions(config: &AppConfig) -> Result<Self> {
        let factory = TextRegionFactory::new(config.detection.to_backend_config());
        Self::new(config, factory)
    }

    fn schedule_configure(&self, mode: AccelerationMode) {
        self.state.write().begin_rebuild();
        let tx = self.events_tx.clone();
        self.worker.schedule(move |guardian| {
            let event = match guardian.configure(mode) {
                Ok(()) => UiEvent::Configured(mode),
                Err(e) => UiEvent::ConstructionFailed {
                    mode,
                    message: e.message.clone(),
                },
            };
            let _ = tx.send(event);
        });
    }

    /// Toggle handler: rebuild the executor for `mode`
    pub fn set_acceleration(&self, mode: AccelerationMode) {
        info!("Acceleration mode set to {}", mode);
        self.state.write().acceleration = mode;
        self.schedule_configure(mode);
    }

    /// Use `frame` for the next detect request
    pub fn select_image(&self, frame: CapturedFrame) {
        debug!("Selected image from {}", frame.source);
        self.state.write().selected_image = Some(Arc::new(frame));
    }

    /// Load an image and select it. On failure the previous image stays selected.
    pub fn acquire_image(&self, source: &ImageSource) -> Result<()> {
        match capture::acquire(source) {
            Ok(frame) => {
                self.select_image(frame);
                Ok(())
            }
            Err(e) => {
                error!("Failed to acquire image: {}", e);
                self.state.write().set_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Detect handler: disable input and queue OCR on the selected image
    pub fn detect(&self) -> Result<Uuid> {
        let image = {
            let mut state = self.state.write();
            if !state.controls_enabled {
                bail!("A detect request is already running");
            }
            if !self.worker.is_running() {
                bail!("Inference worker is not running");
            }
            let image = state
                .selected_image
                .clone()
                .ok_or_else(|| anyhow!("No image selected"))?;
            state.begin_request();
            image
        };

        let request = ExecutionRequest::new(image);
        let id = request.id;
        let tx = self.events_tx.clone();
        self.dispatcher.submit_with(request, move |completion| {
            let _ = tx.send(UiEvent::RequestFinished {
                id,
                skipped: completion.is_skipped(),
            });
        });

        Ok(id)
    }

    /// Apply all queued worker events. Returns how many were applied.
    pub fn pump_events(&self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(&event);
            applied += 1;
        }
        applied
    }

    fn apply(&self, event: &UiEvent) {
        debug!("Applying worker event: {:?}", EventKind(event));
        self.state.write().apply(event);
    }

    /// Apply events until no request or rebuild is outstanding
    pub fn wait_until_idle(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.pump_events();
        while !self.state.read().is_idle() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                bail!("Timed out after {:?} waiting for the inference worker", timeout);
            }
            match self.events_rx.recv_timeout(remaining.min(IDLE_POLL)) {
                Ok(event) => self.apply(&event),
                Err(RecvTimeoutError::Timeout) => {
                    // Events already sent are still drained before giving up
                    if !self.worker.is_running() && self.events_rx.is_empty() {
                        bail!("Inference worker stopped with work outstanding");
                    }
                }
                Err(RecvTimeoutError::Disconnected) => bail!("Inference worker disconnected"),
            }
        }
        Ok(())
    }

    /// Snapshot of the current UI state
    pub fn state(&self) -> UiState {
        self.state.read().clone()
    }

    /// Slot every outcome is posted to
    pub fn results(&self) -> &LastValueSlot<ExecutionOutcome> {
        self.dispatcher.results()
    }

    /// Register an extra outcome observer; the latest outcome is replayed
    pub fn subscribe_results(
        &self,
        callback: impl Fn(&ExecutionOutcome) + Send + Sync + 'static,
    ) -> Subscription<ExecutionOutcome> {
        self.results().subscribe(callback)
    }

    /// Check if the inference worker is running
    pub fn is_worker_running(&self) -> bool {
        self.worker.is_running()
    }
}

/// Compact log form of an event (outcomes carry whole images)
struct EventKind<'a>(&'a UiEvent);

impl std::fmt::Debug for EventKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            UiEvent::Outcome(ExecutionOutcome::Success(r)) => {
                write!(f, "Outcome(Success, {} items)", r.items_found.len())
            }
            UiEvent::Outcome(ExecutionOutcome::Failure) => write!(f, "Outcome(Failure)"),
            other => write!(f, "{:?}", other),
        }
    }
}
