//! Shared flow-meter pulse counter.
//!
//! The edge handler runs in interrupt context and may preempt the control
//! loop at any point, so it does exactly one relaxed atomic increment and
//! nothing else. Arming, resetting, and volume conversion happen on the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Clone, Default)]
pub struct PulseCounter {
    count: Arc<AtomicU32>,
    armed: Arc<AtomicBool>,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edge callback. Counts only while armed.
    #[inline]
    pub fn on_edge(&self) {
        if self.armed.load(Ordering::Relaxed) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Reset to zero and start counting.
    pub fn arm(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}
