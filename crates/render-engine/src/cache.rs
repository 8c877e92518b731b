//! Time-keyed frame cache for timeline scrubbing.
//!
//! Lookups accept any cached frame within a tolerance of the requested
//! time. When several cached times qualify, the closest one wins and an
//! exact tie goes to the earlier time. Eviction is least-recently-used and
//! happens only inside [`FrameCache::put`].

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::frame::Frame;

/// Default lookup window in seconds.
pub const DEFAULT_TOLERANCE_SECS: f64 = 0.1;

/// Hashable cache key for a time in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TimeKey(u64);

impl TimeKey {
    fn new(secs: f64) -> Self {
        // Adding 0.0 folds -0.0 into 0.0 so both hash alike.
        Self((secs + 0.0).to_bits())
    }

    fn secs(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// Cached times in ascending order.
    pub cached_times: Vec<f64>,
    pub approx_memory_bytes: usize,
}

impl CacheStats {
    pub fn approx_memory_mb(&self) -> f64 {
        self.approx_memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Bounded LRU store of rendered frames, safe to share between threads.
pub struct FrameCache {
    entries: Mutex<LruCache<TimeKey, Frame>>,
    capacity: NonZeroUsize,
    tolerance: f64,
}

impl FrameCache {
    /// A cache holding at most `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        Self::with_tolerance(capacity, DEFAULT_TOLERANCE_SECS)
    }

    pub fn with_tolerance(capacity: usize, tolerance: f64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Default lookup window used by [`FrameCache::get`].
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Look up a frame near `time` using the default tolerance.
    pub fn get(&self, time: f64) -> Option<Frame> {
        self.get_within(time, self.tolerance)
    }

    /// Look up a frame at or within `tolerance` seconds of `time`.
    /// A hit becomes the most recently used entry.
    pub fn get_within(&self, time: f64, tolerance: f64) -> Option<Frame> {
        let mut entries = self.entries.lock();

        let exact = TimeKey::new(time);
        if let Some(frame) = entries.get(&exact) {
            return Some(frame.clone());
        }

        let nearest = entries
            .iter()
            .map(|(key, _)| (*key, (key.secs() - time).abs()))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|(ka, da), (kb, db)| {
                da.total_cmp(db).then_with(|| ka.secs().total_cmp(&kb.secs()))
            })
            .map(|(key, _)| key)?;

        entries.get(&nearest).cloned()
    }

    /// Whether a frame is stored under exactly `time`. Does not touch the
    /// access order.
    pub fn contains(&self, time: f64) -> bool {
        self.entries.lock().contains(&TimeKey::new(time))
    }

    /// Store a frame, evicting the least recently used entry when full.
    ///
    /// The cache keeps its own handle; pixel storage is copy-on-write, so a
    /// caller mutating `frame` afterwards never alters the cached copy.
    pub fn put(&self, time: f64, frame: &Frame) {
        let key = TimeKey::new(time);
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key, frame.clone()) {
            if evicted != key {
                tracing::trace!(evicted = evicted.secs(), inserted = time, "Evicted cached frame");
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let mut cached_times: Vec<f64> = entries.iter().map(|(key, _)| key.secs()).collect();
        cached_times.sort_by(f64::total_cmp);
        CacheStats {
            size: entries.len(),
            max_size: self.capacity.get(),
            cached_times,
            approx_memory_bytes: entries.iter().map(|(_, frame)| frame.byte_size()).sum(),
        }
    }
}
