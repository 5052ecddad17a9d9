//! Dedicated inference thread
//!
//! A single worker owns the `ResourceGuardian`. Jobs are queued on an
//! unbounded channel and run strictly one at a time in submission order, so
//! executor construction, use and release all happen on the same thread.
//! A job that panics is dropped (its handle reports a disconnect) and the
//! worker moves on to the next one.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{AccelerationMode, ConstructionError, ExecutionError, ExecutorFactory, ResourceGuardian};

type Job = Box<dyn FnOnce(&mut ResourceGuardian) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Shutdown,
}

/// Handle to the value a queued job will produce
pub struct JobHandle<R> {
    receiver: Receiver<R>,
}

impl<R> JobHandle<R> {
    /// Block until the job has run
    pub fn wait(self) -> Result<R> {
        self.receiver
            .recv()
            .map_err(|_| anyhow!("Inference worker stopped before the job completed"))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(self, timeout: Duration) -> Result<R> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "Timed out after {:?} waiting for the inference worker",
                timeout
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("Inference worker stopped before the job completed"))
            }
        }
    }

    /// Non-blocking check
    pub fn try_take(&self) -> Option<R> {
        self.receiver.try_recv().ok()
    }
}

/// Single serial worker thread that owns the OCR executor
pub struct InferenceWorker {
    sender: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Spawn the worker. The factory moves onto the worker thread and is only
    /// ever called there.
    pub fn spawn(factory: impl ExecutorFactory + 'static) -> Result<Self> {
        let (sender, receiver) = unbounded::<WorkerMessage>();

        let handle = std::thread::Builder::new()
            .name("ocr-inference".to_string())
            .spawn(move || {
                info!("Inference worker starting...");
                let mut guardian = ResourceGuardian::new(factory);
                while let Ok(message) = receiver.recv() {
                    match message {
                        WorkerMessage::Run(job) => {
                            let ran = catch_unwind(AssertUnwindSafe(|| job(&mut guardian)));
                            if let Err(payload) = ran {
                                error!(
                                    "Inference job panicked: {}",
                                    ExecutionError::from_panic(payload)
                                );
                            }
                        }
                        WorkerMessage::Shutdown => break,
                    }
                }
                guardian.release();
                info!("Inference worker exiting...");
            })
            .context("Failed to spawn inference worker thread")?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Queue a job on the worker and get a handle to its result
    pub fn schedule<R, F>(&self, job: F) -> JobHandle<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ResourceGuardian) -> R + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let wrapped: Job = Box::new(move |guardian| {
            let _ = tx.send(job(guardian));
        });
        if self.sender.send(WorkerMessage::Run(wrapped)).is_err() {
            // Receiver gone: the returned handle reports a disconnect
            error!("Inference worker is not running; job dropped");
        }
        JobHandle { receiver: rx }
    }

    /// Queue a rebuild of the executor for `mode`
    pub fn configure(&self, mode: AccelerationMode) -> JobHandle<Result<(), ConstructionError>> {
        debug!("Scheduling executor rebuild (mode: {})", mode);
        self.schedule(move |guardian| guardian.configure(mode))
    }

    /// Whether the worker thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop accepting jobs, finish the queued ones and join the thread
    pub fn shutdown(&mut self) {
        let _ = self.sender.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Inference worker panicked during shutdown");
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
