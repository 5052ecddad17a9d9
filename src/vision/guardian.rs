//! Lifecycle of the single OCR executor
//!
//! The guardian is owned by the inference worker thread. Every operation on
//! it goes through `&mut self` on that thread, so exclusive access is given by
//! worker affinity rather than by a lock.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info};

use super::{AccelerationMode, ConstructionError, ExecutorFactory, OcrExecutor};

/// Owns the current executor and the factory that rebuilds it
pub struct ResourceGuardian {
    factory: Box<dyn ExecutorFactory>,
    executor: Option<Box<dyn OcrExecutor>>,
    /// Mode of the live executor, `None` when empty
    mode: Option<AccelerationMode>,
    /// Number of executors successfully built so far
    builds: u64,
}

impl ResourceGuardian {
    /// Create an empty guardian. Nothing is built until the first `configure`.
    pub fn new(factory: impl ExecutorFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            executor: None,
            mode: None,
            builds: 0,
        }
    }

    /// Tear down the current executor (if any) and build a new one for `mode`
    ///
    /// On failure the guardian stays empty and the error is returned so the
    /// caller can surface the message.
    pub fn configure(&mut self, mode: AccelerationMode) -> Result<(), ConstructionError> {
        self.release();

        info!("Creating OCR executor (mode: {})", mode);
        let created = catch_unwind(AssertUnwindSafe(|| self.factory.create(mode)))
            .unwrap_or_else(|payload| {
                let message = super::ExecutionError::from_panic(payload).to_string();
                Err(ConstructionError::new(mode, message))
            });

        match created {
            Ok(executor) => {
                self.executor = Some(executor);
                self.mode = Some(mode);
                self.builds += 1;
                info!("OCR executor ready (mode: {}, build #{})", mode, self.builds);
                Ok(())
            }
            Err(e) => {
                error!("Fail to create OCR executor ({}): {}", mode, e);
                Err(e)
            }
        }
    }

    /// Close and drop the current executor
    ///
    /// A panic inside `close` is logged and swallowed; the executor is dropped
    /// either way.
    pub fn release(&mut self) {
        if let Some(mut executor) = self.executor.take() {
            debug!("Closing OCR executor (mode: {:?})", self.mode);
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| executor.close())) {
                error!(
                    "OCR executor panicked while closing: {}",
                    super::ExecutionError::from_panic(payload)
                );
            }
        }
        self.mode = None;
    }

    /// Run `f` against the live executor, or return `None` if there is none
    pub fn run_exclusive<R>(&mut self, f: impl FnOnce(&mut dyn OcrExecutor) -> R) -> Option<R> {
        let executor = self.executor.as_deref_mut()?;
        Some(f(executor))
    }

    /// Whether an executor is currently live
    pub fn is_ready(&self) -> bool {
        self.executor.is_some()
    }

    /// Mode of the live executor
    pub fn mode(&self) -> Option<AccelerationMode> {
        self.mode
    }

    /// Number of successful builds since creation
    pub fn builds(&self) -> u64 {
        self.builds
    }
}

impl Drop for ResourceGuardian {
    fn drop(&mut self) {
        self.release();
    }
}
