//! Cheap cross-thread progress counting.
//!
//! Workers tick once per expanded state; a ticker thread reads the sum to
//! report progress through a long layer.  One cache-padded slot per worker
//! thread keeps the hot-path increment contention-free.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

pub struct Progress {
    slots: Vec<CachePadded<AtomicU64>>,
    done: AtomicBool,
}

impl Progress {
    pub fn new() -> Progress {
        let mut slots = Vec::new();
        slots.resize_with(num_cpus::get().max(1), || CachePadded::new(AtomicU64::new(0)));
        Progress {
            slots,
            done: AtomicBool::new(false),
        }
    }

    pub fn tick(&self) {
        let idx = rayon::current_thread_index().unwrap_or(0) % self.slots.len();
        self.slots[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.slots.iter().map(|slot| slot.load(Ordering::Relaxed)).sum()
    }

    /// Tell the ticker thread the layer is over (the count may be short when
    /// a worker failed, so the flag is authoritative).
    pub fn finish(&self) {
        self.done.store(true, Ordering::Relaxed);
    }

    pub fn finished(&self) -> bool {
        self.done.load(Ordering::Relaxed)
    }
}

impl Default for Progress {
    fn default() -> Progress {
        Progress::new()
    }
}
