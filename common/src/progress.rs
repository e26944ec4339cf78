use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use parking_lot::Mutex;

/// Shared handle for watching (and cancelling) a long running operation from
/// another thread.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

struct ProgressInner {
    fraction: AtomicU32,
    label: Mutex<String>,

    finished: AtomicBool,
    cancelled: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self(Arc::new(ProgressInner {
            fraction: AtomicU32::new(0_f32.to_bits()),
            label: Mutex::new(String::new()),

            finished: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }))
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.0.fraction.load(Ordering::Relaxed))
    }

    pub fn label(&self) -> String {
        self.0.label.lock().clone()
    }

    /// Records a new stage. The fraction is clamped to `[0, 1]` and never
    /// moves backwards.
    pub fn set_stage(&self, fraction: f32, label: &str) {
        let fraction = fraction.clamp(0.0, 1.0).max(self.progress());
        self.0.fraction.store(fraction.to_bits(), Ordering::Relaxed);

        let mut current = self.0.label.lock();
        current.clear();
        current.push_str(label);
    }

    pub fn complete(&self) -> bool {
        self.0.finished.load(Ordering::Relaxed)
    }

    pub fn set_finished(&self) {
        self.0.finished.store(true, Ordering::Relaxed);
    }

    /// Starts over for a new run. A pending cancel is kept.
    pub fn reset(&self) {
        self.0.fraction.store(0_f32.to_bits(), Ordering::Relaxed);
        self.0.label.lock().clear();
        self.0.finished.store(false, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Relaxed)
    }

    pub fn clear_cancelled(&self) {
        self.0.cancelled.store(false, Ordering::Relaxed);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
