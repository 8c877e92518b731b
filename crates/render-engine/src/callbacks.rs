//! Observer registries for rendered frames and playhead time.
//!
//! Observers run on whichever thread produced the event (the caller of
//! `seek_to_time` or the playback loop). A panicking observer is logged and
//! skipped; the remaining observers still run and the producer is never
//! interrupted.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::frame::Frame;

/// Receives each frame rendered during playback with its time.
pub type FrameCallback = dyn Fn(&Frame, f64) + Send + Sync;

/// Receives playhead time changes.
pub type TimeCallback = dyn Fn(f64) + Send + Sync;

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<F: ?Sized> {
    entries: Mutex<Vec<(SubscriptionId, Arc<F>)>>,
}

impl<F: ?Sized> Registry<F> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, id: SubscriptionId, callback: Arc<F>) {
        self.entries.lock().push((id, callback));
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Copy of the current observers so none is invoked under the lock.
    fn snapshot(&self) -> Vec<(SubscriptionId, Arc<F>)> {
        self.entries.lock().clone()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Frame and time observer lists with failure isolation.
pub struct CallbackHub {
    next_id: AtomicU64,
    frame: Registry<FrameCallback>,
    time: Registry<TimeCallback>,
    failures: AtomicUsize,
}

impl Default for CallbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            frame: Registry::new(),
            time: Registry::new(),
            failures: AtomicUsize::new(0),
        }
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_frame_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Frame, f64) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.frame.add(id, Arc::new(callback));
        id
    }

    pub fn add_time_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        let id = self.allocate_id();
        self.time.add(id, Arc::new(callback));
        id
    }

    /// Returns whether an observer was removed.
    pub fn remove_frame_callback(&self, id: SubscriptionId) -> bool {
        self.frame.remove(id)
    }

    pub fn remove_time_callback(&self, id: SubscriptionId) -> bool {
        self.time.remove(id)
    }

    pub fn frame_callback_count(&self) -> usize {
        self.frame.len()
    }

    pub fn time_callback_count(&self) -> usize {
        self.time.len()
    }

    /// Number of observer invocations that panicked so far.
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn notify_frame(&self, frame: &Frame, time: f64) {
        for (id, callback) in self.frame.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| callback(frame, time))).is_err() {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(subscription = id.0, time, "Frame callback panicked");
            }
        }
    }

    pub fn notify_time(&self, time: f64) {
        for (id, callback) in self.time.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| callback(time))).is_err() {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(subscription = id.0, time, "Time callback panicked");
            }
        }
    }
}
