//! Fake executors shared by the vision and app tests

use image::{Rgba, RgbaImage};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    AccelerationMode, ConstructionError, ExecutionError, ExecutorFactory, ModelExecutionResult,
    OcrExecutor,
};
use crate::capture::frame::CapturedFrame;

pub const OCR_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Small solid frame for tests that don't look at pixels
pub fn test_frame() -> CapturedFrame {
    CapturedFrame::new(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])), "test")
}

/// Counters observed by the fakes
#[derive(Debug, Default)]
pub struct Probe {
    live: AtomicUsize,
    max_live: AtomicUsize,
    created: AtomicUsize,
    closed: AtomicUsize,
    executed: AtomicUsize,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

/// What a fake executor does when asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

pub struct FakeExecutor {
    probe: Arc<Probe>,
    mode: AccelerationMode,
    behavior: Behavior,
    delay: Duration,
    closed: bool,
    panic_on_close: bool,
}

impl OcrExecutor for FakeExecutor {
    fn execute(&mut self, image: &CapturedFrame) -> Result<ModelExecutionResult, ExecutionError> {
        assert!(!self.closed, "executor used after close");
        self.probe.executed.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match self.behavior {
            Behavior::Succeed => {
                let mut items_found = BTreeMap::new();
                items_found.insert("OCR".to_string(), OCR_COLOR);
                Ok(ModelExecutionResult {
                    result_image: image.image.clone(),
                    execution_log: format!("mode={}", self.mode),
                    items_found,
                })
            }
            Behavior::Fail => Err(ExecutionError::Failed("model rejected input".to_string())),
            Behavior::Panic => panic!("interpreter crashed"),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
            self.probe.closed.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_close {
                panic!("delegate close failed");
            }
        }
    }
}

pub struct FakeFactory {
    probe: Arc<Probe>,
    failing: HashSet<AccelerationMode>,
    behavior: Behavior,
    build_delay: Duration,
    exec_delay: Duration,
    panic_on_close: bool,
}

impl FakeFactory {
    pub fn new(probe: Arc<Probe>) -> Self {
        Self {
            probe,
            failing: HashSet::new(),
            behavior: Behavior::Succeed,
            build_delay: Duration::ZERO,
            exec_delay: Duration::ZERO,
            panic_on_close: false,
        }
    }

    pub fn failing_on(mut self, mode: AccelerationMode) -> Self {
        self.failing.insert(mode);
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    /// Executors built by this factory panic inside `close`
    pub fn panicking_on_close(mut self) -> Self {
        self.panic_on_close = true;
        self
    }
}

impl ExecutorFactory for FakeFactory {
    fn create(
        &mut self,
        mode: AccelerationMode,
    ) -> Result<Box<dyn OcrExecutor>, ConstructionError> {
        if !self.build_delay.is_zero() {
            std::thread::sleep(self.build_delay);
        }
        if self.failing.contains(&mode) {
            return Err(ConstructionError::new(
                mode,
                format!("{} delegate is not supported on this device", mode),
            ));
        }

        let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(live, Ordering::SeqCst);
        self.probe.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeExecutor {
            probe: self.probe.clone(),
            mode,
            behavior: self.behavior,
            delay: self.exec_delay,
            closed: false,
            panic_on_close: self.panic_on_close,
        }))
    }
}
